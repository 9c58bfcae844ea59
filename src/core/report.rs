use std::thread;

use serde::Serialize;

use super::engine::simulate;
use super::types::{Account, AccountId, SimulationResult, Strategy};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUtilization {
    pub account_id: AccountId,
    pub balance: f64,
    pub credit_limit: f64,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationReport {
    pub accounts: Vec<AccountUtilization>,
    pub total_balance: f64,
    pub total_limit: f64,
    pub overall_ratio: Option<f64>,
}

/// Balance-to-limit ratios for the accounts that carry a credit limit.
pub fn utilization(accounts: &[Account]) -> UtilizationReport {
    let rows: Vec<AccountUtilization> = accounts
        .iter()
        .filter_map(|account| {
            account.credit_limit.map(|limit| AccountUtilization {
                account_id: account.id.clone(),
                balance: account.balance,
                credit_limit: limit,
                ratio: account.balance / limit,
            })
        })
        .collect();

    let total_balance: f64 = rows.iter().map(|row| row.balance).sum();
    let total_limit: f64 = rows.iter().map(|row| row.credit_limit).sum();
    let overall_ratio = (total_limit > 0.0).then(|| total_balance / total_limit);

    UtilizationReport {
        accounts: rows,
        total_balance,
        total_limit,
        overall_ratio,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyComparison {
    pub avalanche: SimulationResult,
    pub snowball: SimulationResult,
    /// Positive when avalanche pays less interest.
    pub interest_saved_by_avalanche: f64,
    /// Positive when avalanche finishes sooner.
    pub months_saved_by_avalanche: i64,
    pub recommended: Strategy,
}

pub fn compare_strategies(
    accounts: &[Account],
    extra_budget: f64,
    months_cap: u32,
    months_to_record: usize,
) -> StrategyComparison {
    let (avalanche, snowball) = thread::scope(|scope| {
        let snowball = scope.spawn(|| {
            simulate(
                accounts,
                Strategy::Snowball,
                extra_budget,
                months_cap,
                months_to_record,
            )
        });
        let avalanche = simulate(
            accounts,
            Strategy::Avalanche,
            extra_budget,
            months_cap,
            months_to_record,
        );
        let snowball = match snowball.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        (avalanche, snowball)
    });

    let interest_saved_by_avalanche = snowball.total_interest_paid - avalanche.total_interest_paid;
    let months_saved_by_avalanche =
        i64::from(snowball.months_to_payoff) - i64::from(avalanche.months_to_payoff);
    let recommended = recommend(&avalanche, &snowball);

    StrategyComparison {
        avalanche,
        snowball,
        interest_saved_by_avalanche,
        months_saved_by_avalanche,
        recommended,
    }
}

fn recommend(avalanche: &SimulationResult, snowball: &SimulationResult) -> Strategy {
    if avalanche.stalled != snowball.stalled {
        return if avalanche.stalled {
            Strategy::Snowball
        } else {
            Strategy::Avalanche
        };
    }

    let interest_gap = snowball.total_interest_paid - avalanche.total_interest_paid;
    if interest_gap < -1e-6 {
        return Strategy::Snowball;
    }
    if interest_gap <= 1e-6 && snowball.months_to_payoff < avalanche.months_to_payoff {
        return Strategy::Snowball;
    }
    Strategy::Avalanche
}
