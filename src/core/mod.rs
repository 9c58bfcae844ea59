mod engine;
mod ranker;
mod report;
mod snapshot;
mod solver;
mod types;

pub use engine::{SimulationState, simulate, step};
pub use ranker::rank;
pub use report::{
    AccountUtilization, StrategyComparison, UtilizationReport, compare_strategies, utilization,
};
pub use snapshot::{
    AccountRecord, DEFAULT_MONTHS_CAP, DEFAULT_MONTHS_TO_RECORD, PlanSnapshot, load_snapshot,
};
pub use solver::{
    BudgetSolveConfig, BudgetSolveIteration, BudgetSolveResult, MAX_SOLVE_ITERATIONS,
    solve_extra_budget,
};
pub use types::{
    Account, AccountId, AccountLedgerEntry, AccountSummary, BALANCE_EPSILON, MonthLedgerRow,
    PAID_OFF_EPSILON, SimulationResult, StallReason, Strategy,
};
