use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::types::{Account, Strategy};
use crate::error::PlanError;

pub const DEFAULT_MONTHS_CAP: u32 = 600;
pub const DEFAULT_MONTHS_TO_RECORD: usize = 60;

/// One account as stored by the account editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccountRecord {
    pub id: String,
    pub name: String,
    pub balance: f64,
    #[serde(alias = "annualRate")]
    pub apr: f64,
    pub minimum_payment: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_limit: Option<f64>,
}

impl AccountRecord {
    pub fn to_account(&self) -> Account {
        let name = if self.name.is_empty() {
            self.id.clone()
        } else {
            self.name.clone()
        };
        Account::new(
            self.id.as_str(),
            name,
            self.balance,
            self.apr,
            self.minimum_payment,
            self.credit_limit,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSnapshot {
    pub accounts: Vec<AccountRecord>,
    #[serde(default = "default_strategy")]
    pub strategy: Strategy,
    #[serde(default)]
    pub extra_budget: f64,
    #[serde(default = "default_months_cap")]
    pub months_cap: u32,
    #[serde(default = "default_months_to_record")]
    pub months_to_record: usize,
}

fn default_strategy() -> Strategy {
    Strategy::Avalanche
}

fn default_months_cap() -> u32 {
    DEFAULT_MONTHS_CAP
}

fn default_months_to_record() -> usize {
    DEFAULT_MONTHS_TO_RECORD
}

impl PlanSnapshot {
    pub fn from_json(json: &str) -> Result<Self, PlanError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.accounts.iter().map(AccountRecord::to_account).collect()
    }
}

pub fn load_snapshot(path: impl AsRef<Path>) -> Result<PlanSnapshot, PlanError> {
    let raw = fs::read_to_string(path)?;
    PlanSnapshot::from_json(&raw)
}
