use std::cmp::Ordering;

use super::types::{Account, AccountId, Strategy};

/// Orders the accounts that still carry a balance by payoff priority.
///
/// Paid-off accounts are left out. Ties on the primary key fall back to the
/// secondary key and finally to the account id, so the order is total.
pub fn rank(accounts: &[Account], strategy: Strategy) -> Vec<AccountId> {
    rank_indices(accounts, strategy)
        .into_iter()
        .map(|idx| accounts[idx].id.clone())
        .collect()
}

pub(crate) fn rank_indices(accounts: &[Account], strategy: Strategy) -> Vec<usize> {
    let mut order: Vec<usize> = accounts
        .iter()
        .enumerate()
        .filter(|(_, account)| !account.is_paid_off())
        .map(|(idx, _)| idx)
        .collect();

    order.sort_by(|&a, &b| priority(&accounts[a], &accounts[b], strategy));
    order
}

fn priority(a: &Account, b: &Account, strategy: Strategy) -> Ordering {
    let primary = match strategy {
        Strategy::Avalanche => b
            .annual_rate
            .total_cmp(&a.annual_rate)
            .then_with(|| b.balance.total_cmp(&a.balance)),
        Strategy::Snowball => a
            .balance
            .total_cmp(&b.balance)
            .then_with(|| b.annual_rate.total_cmp(&a.annual_rate)),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}
