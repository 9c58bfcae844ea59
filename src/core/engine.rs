use tracing::{debug, warn};

use super::ranker::{rank, rank_indices};
use super::types::{
    Account, AccountLedgerEntry, AccountSummary, BALANCE_EPSILON, MonthLedgerRow,
    PAID_OFF_EPSILON, SimulationResult, StallReason, Strategy,
};

/// Payments below this in month 1 count as no progress at all.
const PROGRESS_EPSILON: f64 = 1e-9;

/// Working balances for one run. Only `balance` changes while stepping.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    accounts: Vec<Account>,
    month: u32,
}

impl SimulationState {
    pub fn new(accounts: &[Account]) -> Self {
        Self {
            accounts: accounts.to_vec(),
            month: 0,
        }
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Number of months stepped so far.
    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn remaining_debt(&self) -> f64 {
        self.accounts.iter().map(|account| account.balance).sum()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct MonthFlow {
    interest: f64,
    minimum: f64,
    extra: f64,
}

impl MonthFlow {
    fn total_paid(self) -> f64 {
        self.minimum + self.extra
    }

    fn is_idle(self) -> bool {
        self.interest <= 0.0 && self.total_paid() <= 0.0
    }
}

/// Advances every account by one billing cycle.
///
/// Interest accrues first, then minimums are paid, then `extra_budget` is
/// spent down the priority order recomputed from the post-minimum balances.
/// Extra left over once every account is cleared is dropped.
pub fn step(
    state: SimulationState,
    strategy: Strategy,
    extra_budget: f64,
) -> (SimulationState, MonthLedgerRow) {
    let (state, flows) = advance(state, strategy, extra_budget);
    let row = assemble_row(&state, &flows);
    (state, row)
}

/// One billing cycle; the returned flows line up with `state.accounts`.
fn advance(
    mut state: SimulationState,
    strategy: Strategy,
    extra_budget: f64,
) -> (SimulationState, Vec<MonthFlow>) {
    state.month += 1;
    let mut flows = vec![MonthFlow::default(); state.accounts.len()];

    for (account, flow) in state.accounts.iter_mut().zip(flows.iter_mut()) {
        if account.balance > BALANCE_EPSILON {
            let interest = account.balance * account.periodic_rate();
            account.balance += interest;
            flow.interest = interest;
        }
    }

    for (account, flow) in state.accounts.iter_mut().zip(flows.iter_mut()) {
        if account.balance > BALANCE_EPSILON {
            let payment = account.minimum_payment.min(account.balance);
            account.balance -= payment;
            flow.minimum = payment;
        }
    }

    let mut remaining_extra = if extra_budget.is_finite() {
        extra_budget.max(0.0)
    } else {
        0.0
    };
    for idx in rank_indices(&state.accounts, strategy) {
        if remaining_extra <= PAID_OFF_EPSILON {
            break;
        }
        let account = &mut state.accounts[idx];
        let payment = remaining_extra.min(account.balance);
        account.balance -= payment;
        remaining_extra -= payment;
        flows[idx].extra += payment;
    }

    (state, flows)
}

fn assemble_row(state: &SimulationState, flows: &[MonthFlow]) -> MonthLedgerRow {
    let mut entries: Vec<AccountLedgerEntry> = state
        .accounts
        .iter()
        .zip(flows)
        .filter(|(_, flow)| !flow.is_idle())
        .map(|(account, flow)| AccountLedgerEntry {
            account_id: account.id.clone(),
            name: account.name.clone(),
            interest_accrued: flow.interest,
            minimum_paid: flow.minimum,
            extra_paid: flow.extra,
            total_paid: flow.total_paid(),
            balance_after: account.balance,
        })
        .collect();
    entries.sort_by(|a, b| {
        b.total_paid
            .total_cmp(&a.total_paid)
            .then_with(|| a.account_id.cmp(&b.account_id))
    });

    let total_interest_accrued = flows.iter().map(|flow| flow.interest).sum();
    let total_minimum_paid: f64 = flows.iter().map(|flow| flow.minimum).sum();
    let total_extra_paid: f64 = flows.iter().map(|flow| flow.extra).sum();

    MonthLedgerRow {
        month: state.month,
        accounts: entries,
        total_interest_accrued,
        total_minimum_paid,
        total_extra_paid,
        total_paid: total_minimum_paid + total_extra_paid,
        remaining_debt_after_month: state.remaining_debt(),
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct AccountTally {
    total_paid: f64,
    interest_paid: f64,
    payoff_month: Option<u32>,
}

/// Runs months until every balance is cleared or `months_cap` is reached.
///
/// Only the first `months_to_record` ledger rows are kept; the rest of the run
/// still counts toward the totals.
pub fn simulate(
    accounts: &[Account],
    strategy: Strategy,
    extra_budget: f64,
    months_cap: u32,
    months_to_record: usize,
) -> SimulationResult {
    let working: Vec<Account> = accounts
        .iter()
        .filter(|account| participates(account))
        .cloned()
        .collect();
    let initial_priority_order = rank(&working, strategy);

    let mut state = SimulationState::new(&working);
    let starting_debt = state.remaining_debt();
    let had_debt_at_start = starting_debt > BALANCE_EPSILON;
    debug!(
        ?strategy,
        accounts = working.len(),
        starting_debt,
        extra_budget,
        months_cap,
        "starting payoff simulation"
    );

    let mut tallies: Vec<AccountTally> = working
        .iter()
        .map(|account| AccountTally {
            payoff_month: (account.balance <= BALANCE_EPSILON).then_some(0),
            ..AccountTally::default()
        })
        .collect();
    let mut months = Vec::with_capacity(months_to_record.min(months_cap as usize));
    let mut total_interest_paid = 0.0;
    let mut months_to_payoff = None;
    let mut no_progress = false;

    for month in 1..=months_cap {
        if state.remaining_debt() <= BALANCE_EPSILON {
            months_to_payoff = Some(month - 1);
            break;
        }

        let (next, flows) = advance(state, strategy, extra_budget);
        state = next;
        let row = assemble_row(&state, &flows);
        total_interest_paid += row.total_interest_accrued;

        if month == 1
            && had_debt_at_start
            && row.total_minimum_paid + row.total_extra_paid <= PROGRESS_EPSILON
        {
            no_progress = true;
        }

        for ((account, flow), tally) in state
            .accounts()
            .iter()
            .zip(&flows)
            .zip(tallies.iter_mut())
        {
            tally.total_paid += flow.total_paid();
            tally.interest_paid += flow.interest;
            if tally.payoff_month.is_none() && account.balance <= BALANCE_EPSILON {
                tally.payoff_month = Some(month);
            }
        }

        if months.len() < months_to_record {
            months.push(row);
        }

        if state.remaining_debt() <= BALANCE_EPSILON {
            months_to_payoff = Some(month);
            break;
        }
    }

    let remaining_debt = state.remaining_debt();
    if months_to_payoff.is_none() && remaining_debt <= BALANCE_EPSILON {
        months_to_payoff = Some(months_cap);
    }
    let stall_reason = if no_progress {
        Some(StallReason::NoProgress)
    } else if months_to_payoff.is_none() {
        Some(StallReason::CapReached)
    } else {
        None
    };
    let stalled = stall_reason.is_some();
    if stalled {
        warn!(
            ?strategy,
            ?stall_reason,
            remaining_debt,
            months_cap,
            "payoff simulation stalled"
        );
    }

    let summaries = summarize_accounts(accounts, state.accounts(), &tallies);
    let months_to_payoff = months_to_payoff.unwrap_or(months_cap);
    debug!(
        ?strategy,
        months_to_payoff, total_interest_paid, stalled, "finished payoff simulation"
    );

    SimulationResult {
        strategy,
        months_to_payoff,
        total_interest_paid,
        starting_debt,
        remaining_debt,
        initial_priority_order,
        months,
        accounts: summaries,
        stalled,
        stall_reason,
    }
}

/// Accounts with nothing owed and nothing due contribute nothing to a run.
fn participates(account: &Account) -> bool {
    !(account.is_paid_off() && account.minimum_payment <= 0.0)
}

fn summarize_accounts(
    inputs: &[Account],
    finals: &[Account],
    tallies: &[AccountTally],
) -> Vec<AccountSummary> {
    let mut next_working = 0;
    inputs
        .iter()
        .map(|account| {
            let slot = participates(account).then(|| {
                next_working += 1;
                next_working - 1
            });
            match slot {
                Some(idx) => AccountSummary {
                    account_id: account.id.clone(),
                    name: account.name.clone(),
                    starting_balance: account.balance,
                    remaining_balance: finals[idx].balance,
                    total_paid: tallies[idx].total_paid,
                    interest_paid: tallies[idx].interest_paid,
                    payoff_month: tallies[idx].payoff_month,
                },
                None => AccountSummary {
                    account_id: account.id.clone(),
                    name: account.name.clone(),
                    starting_balance: 0.0,
                    remaining_balance: 0.0,
                    total_paid: 0.0,
                    interest_paid: 0.0,
                    payoff_month: Some(0),
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn card(id: &str, balance: f64, rate: f64, minimum: f64) -> Account {
        Account::new(id, format!("Card {id}"), balance, rate, minimum, None)
    }

    fn entry<'a>(row: &'a MonthLedgerRow, id: &str) -> &'a AccountLedgerEntry {
        row.accounts
            .iter()
            .find(|entry| entry.account_id.as_str() == id)
            .unwrap_or_else(|| panic!("missing ledger entry for {id}"))
    }

    fn rollover_pair() -> Vec<Account> {
        vec![card("a", 100.0, 22.0, 20.0), card("b", 5_000.0, 12.0, 50.0)]
    }

    #[test]
    fn step_single_account_minimum_only() {
        let state = SimulationState::new(&[card("a", 1_000.0, 24.0, 50.0)]);
        let (state, row) = step(state, Strategy::Avalanche, 0.0);

        assert_eq!(row.month, 1);
        assert_eq!(state.month(), 1);
        assert_approx(row.total_interest_accrued, 20.0);
        assert_approx(row.total_minimum_paid, 50.0);
        assert_approx(row.total_extra_paid, 0.0);
        assert_approx(row.remaining_debt_after_month, 970.0);
        assert_approx(state.accounts()[0].balance, 970.0);
    }

    #[test]
    fn step_rolls_extra_past_a_cleared_account() {
        let state = SimulationState::new(&rollover_pair());
        let (state, row) = step(state, Strategy::Avalanche, 200.0);

        let a_interest = 100.0 * 0.22 / 12.0;
        let a = entry(&row, "a");
        assert_approx(a.minimum_paid, 20.0);
        assert_approx(a.extra_paid, 100.0 + a_interest - 20.0);
        assert_approx(a.balance_after, 0.0);

        let b = entry(&row, "b");
        assert_approx(b.interest_accrued, 50.0);
        assert_approx(b.extra_paid, 200.0 - (100.0 + a_interest - 20.0));
        assert_approx(row.total_extra_paid, 200.0);
        assert_approx(state.accounts()[0].balance, 0.0);
        assert_approx(
            row.remaining_debt_after_month,
            state.accounts()[1].balance,
        );
    }

    #[test]
    fn step_clamps_minimum_to_balance() {
        let state = SimulationState::new(&[card("a", 30.0, 0.0, 50.0)]);
        let (state, row) = step(state, Strategy::Snowball, 0.0);
        assert_approx(row.total_minimum_paid, 30.0);
        assert_approx(state.remaining_debt(), 0.0);
    }

    #[test]
    fn step_skips_accrual_and_minimum_near_zero_but_still_takes_extra() {
        let state = SimulationState::new(&[card("a", 0.005, 20.0, 25.0)]);
        let (state, row) = step(state, Strategy::Avalanche, 10.0);
        let a = entry(&row, "a");
        assert_approx(a.interest_accrued, 0.0);
        assert_approx(a.minimum_paid, 0.0);
        assert_approx(a.extra_paid, 0.005);
        assert_approx(state.remaining_debt(), 0.0);
    }

    #[test]
    fn step_orders_entries_by_total_paid_and_drops_idle_accounts() {
        let accounts = vec![
            card("small", 40.0, 0.0, 10.0),
            card("idle", 0.0, 15.0, 10.0),
            card("big", 900.0, 0.0, 60.0),
        ];
        let (_, row) = step(SimulationState::new(&accounts), Strategy::Avalanche, 0.0);
        let ids: Vec<&str> = row.accounts.iter().map(|e| e.account_id.as_str()).collect();
        assert_eq!(ids, vec!["big", "small"]);
    }

    #[test]
    fn simulate_does_not_mutate_caller_accounts() {
        let accounts = rollover_pair();
        let snapshot = accounts.clone();
        let _ = simulate(&accounts, Strategy::Avalanche, 200.0, 600, 12);
        assert_eq!(accounts, snapshot);
    }

    #[test]
    fn simulate_single_account_minimum_only() {
        let accounts = vec![card("a", 1_000.0, 24.0, 50.0)];
        let result = simulate(&accounts, Strategy::Avalanche, 0.0, 600, 600);

        assert!(!result.stalled);
        assert_eq!(result.stall_reason, None);
        assert_approx(result.months[0].total_interest_accrued, 20.0);
        assert_approx(result.months[0].remaining_debt_after_month, 970.0);
        assert_eq!(result.months.len() as u32, result.months_to_payoff);
        assert!(result.remaining_debt <= BALANCE_EPSILON);
        assert_eq!(result.accounts[0].payoff_month, Some(result.months_to_payoff));
        assert_approx_tol(
            result.accounts[0].total_paid,
            1_000.0 + result.total_interest_paid,
            1e-6,
        );
    }

    #[test]
    fn simulate_flags_stall_when_nothing_is_paid() {
        let accounts = vec![card("a", 500.0, 20.0, 0.0)];
        let result = simulate(&accounts, Strategy::Avalanche, 0.0, 36, 36);

        assert!(result.stalled);
        assert_eq!(result.stall_reason, Some(StallReason::NoProgress));
        assert_eq!(result.months_to_payoff, 36);
        assert_eq!(result.months.len(), 36);

        let mut previous = 500.0;
        for row in &result.months {
            assert!(row.remaining_debt_after_month > previous);
            assert_approx(row.total_paid, 0.0);
            previous = row.remaining_debt_after_month;
        }
        assert_eq!(result.accounts[0].payoff_month, None);
    }

    #[test]
    fn simulate_flags_cap_exhaustion_when_minimum_trails_interest() {
        let accounts = vec![card("a", 10_000.0, 30.0, 100.0)];
        let result = simulate(&accounts, Strategy::Avalanche, 0.0, 120, 6);

        assert!(result.stalled);
        assert_eq!(result.stall_reason, Some(StallReason::CapReached));
        assert_eq!(result.months_to_payoff, 120);
        assert_eq!(result.months.len(), 6);
        assert!(result.remaining_debt > 10_000.0);
    }

    #[test]
    fn simulate_rolls_extra_and_pays_off() {
        let result = simulate(&rollover_pair(), Strategy::Avalanche, 200.0, 600, 600);
        let first = &result.months[0];
        assert_approx(entry(first, "a").balance_after, 0.0);
        assert!(entry(first, "b").extra_paid > 100.0);
        assert_eq!(result.accounts[0].payoff_month, Some(1));
        assert!(!result.stalled);
        assert!(result.months_to_payoff > 1);
    }

    #[test]
    fn initial_priority_order_differs_between_strategies() {
        let accounts = vec![card("a", 100.0, 5.0, 20.0), card("b", 5_000.0, 25.0, 50.0)];
        let avalanche = simulate(&accounts, Strategy::Avalanche, 200.0, 600, 0);
        let snowball = simulate(&accounts, Strategy::Snowball, 200.0, 600, 0);

        let order = |r: &SimulationResult| {
            r.initial_priority_order
                .iter()
                .map(|id| id.as_str().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(order(&avalanche), vec!["b", "a"]);
        assert_eq!(order(&snowball), vec!["a", "b"]);
        assert!(avalanche.total_interest_paid <= snowball.total_interest_paid + EPS);
    }

    #[test]
    fn simulate_with_no_debt_is_idempotent() {
        let accounts = vec![card("a", 0.0, 19.0, 0.0), card("b", 0.0, 5.0, 25.0)];
        let result = simulate(&accounts, Strategy::Snowball, 100.0, 600, 60);

        assert_eq!(result.months_to_payoff, 0);
        assert!(result.months.is_empty());
        assert_approx(result.total_interest_paid, 0.0);
        assert!(!result.stalled);
        assert!(result.initial_priority_order.is_empty());
        assert_eq!(result.accounts.len(), 2);
        for summary in &result.accounts {
            assert_approx(summary.starting_balance, 0.0);
            assert_approx(summary.total_paid, 0.0);
            assert_eq!(summary.payoff_month, Some(0));
        }
    }

    #[test]
    fn simulate_with_empty_input_is_idempotent() {
        let result = simulate(&[], Strategy::Avalanche, 0.0, 600, 60);
        assert_eq!(result.months_to_payoff, 0);
        assert!(!result.stalled);
        assert!(result.accounts.is_empty());
    }

    #[test]
    fn simulate_with_zero_cap_and_debt_is_stalled() {
        let result = simulate(&[card("a", 10.0, 0.0, 10.0)], Strategy::Avalanche, 0.0, 0, 10);
        assert_eq!(result.months_to_payoff, 0);
        assert!(result.stalled);
        assert_eq!(result.stall_reason, Some(StallReason::CapReached));
        assert!(result.months.is_empty());
    }

    #[test]
    fn simulate_exact_payoff_month() {
        let result = simulate(&[card("a", 100.0, 0.0, 50.0)], Strategy::Avalanche, 0.0, 600, 600);
        assert_eq!(result.months_to_payoff, 2);
        assert_eq!(result.months.len(), 2);
        assert_approx(result.total_interest_paid, 0.0);
    }

    #[test]
    fn recording_window_does_not_change_totals() {
        let accounts = vec![
            card("a", 2_500.0, 19.9, 60.0),
            card("b", 800.0, 27.5, 25.0),
            card("c", 12_000.0, 6.5, 180.0),
        ];
        let full = simulate(&accounts, Strategy::Snowball, 150.0, 600, 600);
        let windowed = simulate(&accounts, Strategy::Snowball, 150.0, 600, 3);

        assert_eq!(windowed.months.len(), 3);
        assert_eq!(full.months_to_payoff, windowed.months_to_payoff);
        assert_eq!(
            full.total_interest_paid.to_bits(),
            windowed.total_interest_paid.to_bits()
        );
        assert_eq!(full.months[..3], windowed.months[..]);
        assert_eq!(full.accounts, windowed.accounts);
    }

    #[test]
    fn interest_is_not_recorded_for_paid_accounts_after_payoff() {
        let result = simulate(&rollover_pair(), Strategy::Avalanche, 200.0, 600, 600);
        for row in result.months.iter().skip(1) {
            assert!(row.accounts.iter().all(|e| e.account_id.as_str() != "a"));
        }
    }

    #[test]
    fn summaries_credit_each_account_when_ids_repeat() {
        let accounts = vec![card("dup", 300.0, 0.0, 100.0), card("dup", 600.0, 0.0, 100.0)];
        let result = simulate(&accounts, Strategy::Avalanche, 0.0, 600, 0);

        assert_eq!(result.months_to_payoff, 6);
        assert_eq!(result.accounts.len(), 2);
        assert_approx(result.accounts[0].total_paid, 300.0);
        assert_eq!(result.accounts[0].payoff_month, Some(3));
        assert_approx(result.accounts[1].total_paid, 600.0);
        assert_eq!(result.accounts[1].payoff_month, Some(6));
    }

    fn accounts_from(raw: &[(u32, u32, u32)]) -> Vec<Account> {
        raw.iter()
            .enumerate()
            .map(|(i, (cents, rate_bp, min_cents))| {
                card(
                    &format!("acct-{i}"),
                    *cents as f64 / 100.0,
                    *rate_bp as f64 / 100.0,
                    *min_cents as f64 / 100.0,
                )
            })
            .collect()
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_simulate_is_deterministic(
            raw in proptest::collection::vec((0u32..2_000_000, 0u32..3_000, 0u32..40_000), 0..6),
            extra_cents in 0u32..100_000,
            snowball in proptest::bool::ANY,
        ) {
            let accounts = accounts_from(&raw);
            let strategy = if snowball { Strategy::Snowball } else { Strategy::Avalanche };
            let extra = extra_cents as f64 / 100.0;

            let first = simulate(&accounts, strategy, extra, 240, 240);
            let second = simulate(&accounts, strategy, extra, 240, 240);
            prop_assert_eq!(first, second);
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_month_rows_conserve_debt(
            raw in proptest::collection::vec((0u32..2_000_000, 0u32..3_000, 0u32..40_000), 1..6),
            extra_cents in 0u32..100_000,
            snowball in proptest::bool::ANY,
        ) {
            let accounts = accounts_from(&raw);
            let strategy = if snowball { Strategy::Snowball } else { Strategy::Avalanche };
            let result = simulate(&accounts, strategy, extra_cents as f64 / 100.0, 120, 120);

            let mut before = result.starting_debt;
            for row in &result.months {
                let expected = before + row.total_interest_accrued - row.total_paid;
                prop_assert!(
                    (row.remaining_debt_after_month - expected).abs() <= EPS,
                    "month {} expected {expected}, got {}",
                    row.month,
                    row.remaining_debt_after_month
                );
                prop_assert!(row.total_extra_paid <= extra_cents as f64 / 100.0 + EPS);
                for pair in row.accounts.windows(2) {
                    prop_assert!(pair[0].total_paid >= pair[1].total_paid);
                }
                before = row.remaining_debt_after_month;
            }
            prop_assert!(result.months_to_payoff <= 120);
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_balance_decreases_when_payment_beats_interest(
            cents in 10_000u32..5_000_000,
            rate_bp in 0u32..3_600,
            extra_cents in 0u32..50_000,
        ) {
            let balance = cents as f64 / 100.0;
            let rate = rate_bp as f64 / 100.0;
            let minimum = balance * (rate / 100.0 / 12.0 + 0.01);
            let accounts = vec![card("a", balance, rate, minimum)];
            let result = simulate(&accounts, Strategy::Avalanche, extra_cents as f64 / 100.0, 600, 600);

            prop_assert!(!result.stalled);
            let mut previous = balance;
            for row in &result.months {
                prop_assert!(row.remaining_debt_after_month < previous);
                previous = row.remaining_debt_after_month;
            }
        }
    }
}
