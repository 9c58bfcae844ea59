use axum::{
    Router,
    extract::Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::core::{
    Account, AccountRecord, BudgetSolveConfig, BudgetSolveResult, DEFAULT_MONTHS_CAP,
    DEFAULT_MONTHS_TO_RECORD, SimulationResult, Strategy, StrategyComparison, UtilizationReport,
    compare_strategies, load_snapshot, simulate, solve_extra_budget, utilization,
};
use crate::error::PlanError;

/// Upper bound on the month cap a caller may request (100 years).
pub const MAX_MONTHS_CAP: u32 = 1_200;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliStrategy {
    Avalanche,
    Snowball,
}

impl From<CliStrategy> for Strategy {
    fn from(value: CliStrategy) -> Self {
        match value {
            CliStrategy::Avalanche => Strategy::Avalanche,
            CliStrategy::Snowball => Strategy::Snowball,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "debtplan",
    about = "Debt payoff planner (avalanche / snowball month-by-month simulation)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API over HTTP.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Run a plan snapshot and print the result as JSON.
    Plan {
        #[arg(long, help = "Path to a plan snapshot JSON file")]
        snapshot: PathBuf,
        #[arg(long, value_enum, help = "Overrides the snapshot strategy")]
        strategy: Option<CliStrategy>,
        #[arg(long, help = "Monthly budget on top of all minimum payments")]
        extra_budget: Option<f64>,
        #[arg(long, help = "Hard upper bound on simulated months")]
        months_cap: Option<u32>,
        #[arg(long, help = "Number of monthly ledger rows to include in the output")]
        months_to_record: Option<usize>,
        #[arg(long, help = "Run both strategies and print the comparison")]
        compare: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PlanSettings {
    strategy: Strategy,
    extra_budget: f64,
    months_cap: u32,
    months_to_record: usize,
}

impl Default for PlanSettings {
    fn default() -> Self {
        Self {
            strategy: Strategy::Avalanche,
            extra_budget: 0.0,
            months_cap: DEFAULT_MONTHS_CAP,
            months_to_record: DEFAULT_MONTHS_TO_RECORD,
        }
    }
}

#[derive(Debug)]
struct PlanRequest {
    accounts: Vec<Account>,
    settings: PlanSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PlanPayload {
    accounts: Vec<AccountRecord>,
    strategy: Option<Strategy>,
    extra_budget: Option<f64>,
    months_cap: Option<u32>,
    months_to_record: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SolvePayload {
    #[serde(flatten)]
    plan: PlanPayload,
    target_months: Option<u32>,
    search_min: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    strategy: Strategy,
    extra_budget: f64,
    result: SimulationResult,
    utilization: UtilizationReport,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_request(
    records: &[AccountRecord],
    mut settings: PlanSettings,
) -> Result<PlanRequest, PlanError> {
    let invalid = |msg: String| Err(PlanError::InvalidInput(msg));

    if !settings.extra_budget.is_finite() || settings.extra_budget < 0.0 {
        return invalid("extraBudget must be a finite number >= 0".to_string());
    }

    if settings.months_cap == 0 || settings.months_cap > MAX_MONTHS_CAP {
        return invalid(format!("monthsCap must be between 1 and {MAX_MONTHS_CAP}"));
    }

    settings.months_to_record = settings.months_to_record.min(settings.months_cap as usize);

    let mut seen = HashSet::new();
    for record in records {
        if record.id.trim().is_empty() {
            return invalid("every account needs a non-empty id".to_string());
        }
        if !seen.insert(record.id.as_str()) {
            return invalid(format!("duplicate account id: {}", record.id));
        }
    }

    Ok(PlanRequest {
        accounts: records.iter().map(AccountRecord::to_account).collect(),
        settings,
    })
}

fn plan_request_from_payload(payload: PlanPayload) -> Result<PlanRequest, PlanError> {
    let mut settings = PlanSettings::default();

    if let Some(v) = payload.strategy {
        settings.strategy = v;
    }
    if let Some(v) = payload.extra_budget {
        settings.extra_budget = v;
    }
    if let Some(v) = payload.months_cap {
        settings.months_cap = v;
    }
    if let Some(v) = payload.months_to_record {
        settings.months_to_record = v;
    }

    build_request(&payload.accounts, settings)
}

fn solve_request_from_payload(
    payload: SolvePayload,
) -> Result<(PlanRequest, BudgetSolveConfig), PlanError> {
    let request = plan_request_from_payload(payload.plan)?;
    let target_months = payload
        .target_months
        .ok_or_else(|| PlanError::InvalidInput("targetMonths is required".to_string()))?;

    let config = BudgetSolveConfig {
        target_months,
        search_min: payload.search_min.unwrap_or(0.0),
        search_max: payload.search_max.unwrap_or(10_000.0),
        tolerance: payload.tolerance.unwrap_or(0.5),
        max_iterations: payload.max_iterations.unwrap_or(60),
        months_cap: request.settings.months_cap,
    };
    Ok((request, config))
}

fn build_simulate_response(request: &PlanRequest) -> SimulateResponse {
    let settings = request.settings;
    SimulateResponse {
        strategy: settings.strategy,
        extra_budget: settings.extra_budget,
        result: simulate(
            &request.accounts,
            settings.strategy,
            settings.extra_budget,
            settings.months_cap,
            settings.months_to_record,
        ),
        utilization: utilization(&request.accounts),
    }
}

fn build_comparison(request: &PlanRequest) -> StrategyComparison {
    let settings = request.settings;
    compare_strategies(
        &request.accounts,
        settings.extra_budget,
        settings.months_cap,
        settings.months_to_record,
    )
}

pub fn build_router() -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/simulate", post(simulate_handler))
        .route("/api/compare", post(compare_handler))
        .route("/api/solve", post(solve_handler))
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "debt payoff API listening");

    axum::serve(listener, build_router()).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    json_response(
        StatusCode::NOT_FOUND,
        ErrorResponse {
            error: "Not found".to_string(),
        },
    )
}

async fn simulate_handler(Json(payload): Json<PlanPayload>) -> Result<Response, PlanError> {
    let request = plan_request_from_payload(payload)?;
    info!(
        accounts = request.accounts.len(),
        strategy = ?request.settings.strategy,
        "simulate request"
    );
    Ok(json_response(StatusCode::OK, build_simulate_response(&request)))
}

async fn compare_handler(Json(payload): Json<PlanPayload>) -> Result<Response, PlanError> {
    let request = plan_request_from_payload(payload)?;
    info!(accounts = request.accounts.len(), "compare request");
    Ok(json_response(StatusCode::OK, build_comparison(&request)))
}

async fn solve_handler(Json(payload): Json<SolvePayload>) -> Result<Response, PlanError> {
    let (request, config) = solve_request_from_payload(payload)?;
    info!(
        accounts = request.accounts.len(),
        target_months = config.target_months,
        "solve request"
    );
    let result: BudgetSolveResult =
        solve_extra_budget(&request.accounts, request.settings.strategy, config)?;
    Ok(json_response(StatusCode::OK, result))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

/// Executes a parsed command line.
pub async fn run_cli(cli: Cli) -> Result<(), PlanError> {
    match cli.command {
        Command::Serve { port } => Ok(run_http_server(port).await?),
        Command::Plan {
            snapshot,
            strategy,
            extra_budget,
            months_cap,
            months_to_record,
            compare,
        } => {
            let snapshot = load_snapshot(&snapshot)?;
            let mut settings = PlanSettings {
                strategy: snapshot.strategy,
                extra_budget: snapshot.extra_budget,
                months_cap: snapshot.months_cap,
                months_to_record: snapshot.months_to_record,
            };
            if let Some(v) = strategy {
                settings.strategy = v.into();
            }
            if let Some(v) = extra_budget {
                settings.extra_budget = v;
            }
            if let Some(v) = months_cap {
                settings.months_cap = v;
            }
            if let Some(v) = months_to_record {
                settings.months_to_record = v;
            }

            let request = build_request(&snapshot.accounts, settings)?;
            println!("{}", plan_output(&request, compare)?);
            Ok(())
        }
    }
}

fn plan_output(request: &PlanRequest, compare: bool) -> Result<String, PlanError> {
    let json = if compare {
        serde_json::to_string_pretty(&build_comparison(request))?
    } else {
        serde_json::to_string_pretty(&build_simulate_response(request))?
    };
    Ok(json)
}
