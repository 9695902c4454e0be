use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Balance, Cents, TransferRecord, UserId};

/// Net transfer flow for every user that appears in `transfers`.
pub fn compute_all_net_flows(transfers: &[TransferRecord]) -> HashMap<UserId, Cents> {
    let mut flows: HashMap<UserId, Cents> = HashMap::new();

    for transfer in transfers {
        *flows.entry(transfer.from_user).or_insert(0) -= transfer.amount;
        *flows.entry(transfer.to_user).or_insert(0) += transfer.amount;
    }

    flows
}

/// A balance row that disagrees with what deposits and transfers imply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub user_id: UserId,
    pub recorded: Cents,
    pub expected: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub user_count: i64,
    pub balance_count: i64,
    pub transfer_count: i64,
    pub deposit_count: i64,
    pub total_balance: Cents,
    pub total_deposited: Cents,
    pub discrepancies: Vec<Discrepancy>,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Raw figures gathered from storage for an integrity check.
pub struct IntegrityInputs<'a> {
    pub user_count: i64,
    pub deposit_count: i64,
    pub invalid_transfer_amounts: i64,
    pub balances: &'a [Balance],
    pub deposits_by_user: &'a HashMap<UserId, Cents>,
    pub transfers: &'a [TransferRecord],
}

/// Reconcile stored balances against the deposit and transfer history.
///
/// Every balance must be non-negative and equal to the user's deposits plus
/// their net transfer flow. Since transfers only move money between users,
/// the sum of all balances must equal the sum of all deposits.
pub fn build_integrity_report(inputs: IntegrityInputs<'_>) -> IntegrityReport {
    let mut issues = Vec::new();

    let negative = inputs
        .balances
        .iter()
        .filter(|b| b.amount < 0 || b.locked < 0)
        .count();
    if negative > 0 {
        issues.push(format!("{} balance(s) are negative", negative));
    }

    if inputs.invalid_transfer_amounts > 0 {
        issues.push(format!(
            "{} transfer(s) have a non-positive amount",
            inputs.invalid_transfer_amounts
        ));
    }

    let flows = compute_all_net_flows(inputs.transfers);
    let mut discrepancies = Vec::new();
    let mut seen: Vec<UserId> = Vec::with_capacity(inputs.balances.len());

    for balance in inputs.balances {
        seen.push(balance.user_id);
        let expected = inputs
            .deposits_by_user
            .get(&balance.user_id)
            .copied()
            .unwrap_or(0)
            + flows.get(&balance.user_id).copied().unwrap_or(0);
        if balance.total() != expected {
            discrepancies.push(Discrepancy {
                user_id: balance.user_id,
                recorded: balance.total(),
                expected,
            });
        }
    }

    // Users with history but no balance row
    let mut orphaned: Vec<UserId> = inputs
        .deposits_by_user
        .keys()
        .chain(flows.keys())
        .filter(|id| !seen.contains(id))
        .copied()
        .collect();
    orphaned.sort();
    orphaned.dedup();
    for user_id in orphaned {
        let expected = inputs.deposits_by_user.get(&user_id).copied().unwrap_or(0)
            + flows.get(&user_id).copied().unwrap_or(0);
        if expected != 0 {
            discrepancies.push(Discrepancy {
                user_id,
                recorded: 0,
                expected,
            });
        }
    }

    if !discrepancies.is_empty() {
        issues.push(format!(
            "{} balance(s) do not match deposit and transfer history",
            discrepancies.len()
        ));
    }

    let total_balance: Cents = inputs.balances.iter().map(Balance::total).sum();
    let total_deposited: Cents = inputs.deposits_by_user.values().sum();
    if total_balance != total_deposited {
        issues.push(format!(
            "Total balance {} differs from total deposited {}",
            total_balance, total_deposited
        ));
    }

    IntegrityReport {
        user_count: inputs.user_count,
        balance_count: inputs.balances.len() as i64,
        transfer_count: inputs.transfers.len() as i64,
        deposit_count: inputs.deposit_count,
        total_balance,
        total_deposited,
        discrepancies,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn make_transfer(from: UserId, to: UserId, amount: Cents) -> TransferRecord {
        TransferRecord::new(from, to, amount)
    }

    #[test]
    fn test_compute_all_net_flows_empty() {
        assert!(compute_all_net_flows(&[]).is_empty());
    }

    #[test]
    fn test_compute_all_net_flows_mixed() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let carol = Uuid::new_v4();

        let transfers = vec![
            make_transfer(alice, bob, 5000),
            make_transfer(bob, carol, 1500),
            make_transfer(carol, alice, 500),
        ];

        let flows = compute_all_net_flows(&transfers);
        assert_eq!(flows[&alice], -4500);
        assert_eq!(flows[&bob], 3500);
        assert_eq!(flows[&carol], 1000);
    }

    #[test]
    fn test_net_flows_sum_to_zero() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        let transfers = vec![
            make_transfer(a, b, 1000),
            make_transfer(b, c, 500),
            make_transfer(c, a, 200),
            make_transfer(a, c, 300),
        ];

        let total: Cents = compute_all_net_flows(&transfers).values().sum();
        assert_eq!(total, 0, "Transfers must only move money between users");
    }

    #[test]
    fn test_report_healthy_when_balances_reconcile() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let transfers = vec![make_transfer(alice, bob, 40)];
        let balances = vec![Balance::opening(alice, 60), Balance::opening(bob, 40)];
        let deposits = HashMap::from([(alice, 100)]);

        let report = build_integrity_report(IntegrityInputs {
            user_count: 2,
            deposit_count: 1,
            invalid_transfer_amounts: 0,
            balances: &balances,
            deposits_by_user: &deposits,
            transfers: &transfers,
        });

        assert!(report.is_healthy(), "issues: {:?}", report.issues);
        assert_eq!(report.total_balance, 100);
        assert_eq!(report.total_deposited, 100);
    }

    #[test]
    fn test_report_flags_discrepancy() {
        let alice = Uuid::new_v4();
        let balances = vec![Balance::opening(alice, 150)];
        let deposits = HashMap::from([(alice, 100)]);

        let report = build_integrity_report(IntegrityInputs {
            user_count: 1,
            deposit_count: 1,
            invalid_transfer_amounts: 0,
            balances: &balances,
            deposits_by_user: &deposits,
            transfers: &[],
        });

        assert!(!report.is_healthy());
        assert_eq!(
            report.discrepancies,
            vec![Discrepancy {
                user_id: alice,
                recorded: 150,
                expected: 100,
            }]
        );
    }

    #[test]
    fn test_report_flags_missing_balance_row() {
        let alice = Uuid::new_v4();
        let deposits = HashMap::from([(alice, 100)]);

        let report = build_integrity_report(IntegrityInputs {
            user_count: 1,
            deposit_count: 1,
            invalid_transfer_amounts: 0,
            balances: &[],
            deposits_by_user: &deposits,
            transfers: &[],
        });

        assert!(!report.is_healthy());
        assert_eq!(report.discrepancies.len(), 1);
        assert_eq!(report.discrepancies[0].recorded, 0);
    }
}
