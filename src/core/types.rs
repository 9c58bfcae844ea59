use std::fmt;

use serde::{Deserialize, Serialize};

/// Balances at or below this are treated as paid off for ranking and allocation.
pub const PAID_OFF_EPSILON: f64 = 0.00001;

/// Balances at or below this accrue no interest and take no minimum payment.
pub const BALANCE_EPSILON: f64 = 0.01;

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AccountId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Highest APR first.
    #[serde(alias = "cost-optimal", alias = "costOptimal")]
    Avalanche,
    /// Smallest balance first.
    #[serde(alias = "fastest-closure", alias = "fastestClosure")]
    Snowball,
}

/// A debt account as supplied by the caller.
///
/// Numeric fields are clamped to `>= 0` on construction, so every value the
/// engine sees is already in its domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub balance: f64,
    pub annual_rate: f64,
    pub minimum_payment: f64,
    pub credit_limit: Option<f64>,
}

impl Account {
    pub fn new(
        id: impl Into<AccountId>,
        name: impl Into<String>,
        balance: f64,
        annual_rate: f64,
        minimum_payment: f64,
        credit_limit: Option<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            balance: non_negative(balance),
            annual_rate: non_negative(annual_rate),
            minimum_payment: non_negative(minimum_payment),
            credit_limit: credit_limit.map(non_negative).filter(|limit| *limit > 0.0),
        }
    }

    pub fn periodic_rate(&self) -> f64 {
        self.annual_rate / 100.0 / 12.0
    }

    pub fn is_paid_off(&self) -> bool {
        self.balance <= PAID_OFF_EPSILON
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLedgerEntry {
    pub account_id: AccountId,
    pub name: String,
    pub interest_accrued: f64,
    pub minimum_paid: f64,
    pub extra_paid: f64,
    pub total_paid: f64,
    pub balance_after: f64,
}

/// One billing cycle of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthLedgerRow {
    pub month: u32,
    pub accounts: Vec<AccountLedgerEntry>,
    pub total_interest_accrued: f64,
    pub total_minimum_paid: f64,
    pub total_extra_paid: f64,
    pub total_paid: f64,
    pub remaining_debt_after_month: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StallReason {
    /// The first month paid nothing toward any account.
    NoProgress,
    /// Debt remained when the month cap was reached.
    CapReached,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub account_id: AccountId,
    pub name: String,
    pub starting_balance: f64,
    pub remaining_balance: f64,
    pub total_paid: f64,
    pub interest_paid: f64,
    pub payoff_month: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub strategy: Strategy,
    pub months_to_payoff: u32,
    pub total_interest_paid: f64,
    pub starting_debt: f64,
    pub remaining_debt: f64,
    pub initial_priority_order: Vec<AccountId>,
    pub months: Vec<MonthLedgerRow>,
    pub accounts: Vec<AccountSummary>,
    pub stalled: bool,
    pub stall_reason: Option<StallReason>,
}
