use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, UserId};

/// Funds held for a single user. Both fields are always non-negative; the
/// storage layer enforces this with CHECK constraints as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub user_id: UserId,
    /// Spendable funds
    pub amount: Cents,
    /// Funds reserved and not spendable
    pub locked: Cents,
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// Balance row created on the first credit to a user.
    pub fn opening(user_id: UserId, amount: Cents) -> Self {
        assert!(amount >= 0, "Opening balance must not be negative");
        Self {
            user_id,
            amount,
            locked: 0,
            updated_at: Utc::now(),
        }
    }

    /// Zero balance shown to users that never received funds.
    pub fn empty(user_id: UserId) -> Self {
        Self::opening(user_id, 0)
    }

    pub fn total(&self) -> Cents {
        self.amount + self.locked
    }
}

/// Outcome of a point lookup on the balances table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceLookup {
    Found(Balance),
    NotFound,
}

impl BalanceLookup {
    /// Spendable amount, treating a missing row as zero.
    pub fn available(&self) -> Cents {
        match self {
            BalanceLookup::Found(balance) => balance.amount,
            BalanceLookup::NotFound => 0,
        }
    }
}

impl From<Option<Balance>> for BalanceLookup {
    fn from(value: Option<Balance>) -> Self {
        match value {
            Some(balance) => BalanceLookup::Found(balance),
            None => BalanceLookup::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_opening_balance_has_nothing_locked() {
        let balance = Balance::opening(Uuid::new_v4(), 5000);
        assert_eq!(balance.amount, 5000);
        assert_eq!(balance.locked, 0);
        assert_eq!(balance.total(), 5000);
    }

    #[test]
    fn test_lookup_available() {
        let user = Uuid::new_v4();
        assert_eq!(BalanceLookup::NotFound.available(), 0);
        assert_eq!(
            BalanceLookup::Found(Balance::opening(user, 42)).available(),
            42
        );
        assert_eq!(BalanceLookup::from(None), BalanceLookup::NotFound);
    }

    #[test]
    #[should_panic(expected = "Opening balance must not be negative")]
    fn test_opening_balance_rejects_negative() {
        Balance::opening(Uuid::new_v4(), -1);
    }
}
