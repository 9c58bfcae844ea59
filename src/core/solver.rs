use serde::Serialize;
use tracing::debug;

use super::engine::simulate;
use super::types::{Account, Strategy};
use crate::error::PlanError;

/// Upper bound on bisection passes for a single solve.
pub const MAX_SOLVE_ITERATIONS: u32 = 200;

#[derive(Debug, Clone, Copy)]
pub struct BudgetSolveConfig {
    pub target_months: u32,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub months_cap: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_budget: f64,
    pub months_to_payoff: u32,
    pub stalled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSolveResult {
    pub strategy: Strategy,
    pub target_months: u32,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub solved_budget: Option<f64>,
    pub achieved_months: Option<u32>,
    pub achieved_interest: Option<f64>,
    pub iterations: Vec<BudgetSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    months_to_payoff: u32,
    total_interest_paid: f64,
    stalled: bool,
    meets_target: bool,
}

/// Finds the smallest extra budget that clears all debt within `target_months`.
///
/// The payoff month count never rises as the budget grows, so bisection over
/// `[search_min, search_max]` brackets the answer.
pub fn solve_extra_budget(
    accounts: &[Account],
    strategy: Strategy,
    config: BudgetSolveConfig,
) -> Result<BudgetSolveResult, PlanError> {
    validate_config(config)?;

    let mut iterations = Vec::new();
    let low_eval = evaluate_candidate(accounts, strategy, config, config.search_min);
    let high_eval = evaluate_candidate(accounts, strategy, config, config.search_max);

    let mut solved = None;
    let mut converged = false;
    let feasible;
    let message;

    if low_eval.meets_target {
        solved = Some((config.search_min, low_eval));
        converged = true;
        feasible = true;
        message = "Already meets the target at the lower budget bound.".to_string();
    } else if !high_eval.meets_target {
        feasible = false;
        message = "No budget within the search bounds pays off debt by the target month."
            .to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut hi_eval = high_eval;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let eval = evaluate_candidate(accounts, strategy, config, mid);
            iterations.push(BudgetSolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_budget: mid,
                months_to_payoff: eval.months_to_payoff,
                stalled: eval.stalled,
            });

            if eval.meets_target {
                hi = mid;
                hi_eval = eval;
            } else {
                lo = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        solved = Some((hi, hi_eval));
        feasible = true;
        message = if converged {
            "Solved minimum extra budget.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate."
                .to_string()
        };
    }

    debug!(
        ?strategy,
        target_months = config.target_months,
        solved_budget = ?solved.map(|(budget, _)| budget),
        iterations = iterations.len(),
        "extra budget solve finished"
    );

    Ok(BudgetSolveResult {
        strategy,
        target_months: config.target_months,
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
        solved_budget: solved.map(|(budget, _)| budget),
        achieved_months: solved.map(|(_, eval)| eval.months_to_payoff),
        achieved_interest: solved.map(|(_, eval)| eval.total_interest_paid),
        iterations,
        converged,
        feasible,
        message,
    })
}

fn evaluate_candidate(
    accounts: &[Account],
    strategy: Strategy,
    config: BudgetSolveConfig,
    extra_budget: f64,
) -> CandidateEval {
    let result = simulate(accounts, strategy, extra_budget, config.months_cap, 0);
    CandidateEval {
        months_to_payoff: result.months_to_payoff,
        total_interest_paid: result.total_interest_paid,
        stalled: result.stalled,
        meets_target: !result.stalled && result.months_to_payoff <= config.target_months,
    }
}

fn validate_config(config: BudgetSolveConfig) -> Result<(), PlanError> {
    let invalid = |msg: &str| Err(PlanError::InvalidSolveConfig(msg.to_string()));

    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return invalid("search bounds must be finite");
    }
    if config.search_min < 0.0 {
        return invalid("searchMin must be >= 0");
    }
    if config.search_max < config.search_min {
        return invalid("searchMax must be >= searchMin");
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return invalid("tolerance must be > 0");
    }
    if config.max_iterations == 0 {
        return invalid("maxIterations must be > 0");
    }
    if config.max_iterations > MAX_SOLVE_ITERATIONS {
        return invalid("maxIterations must be <= 200");
    }
    if config.target_months == 0 {
        return invalid("targetMonths must be >= 1");
    }
    if config.months_cap < config.target_months {
        return invalid("monthsCap must be >= targetMonths");
    }
    Ok(())
}
