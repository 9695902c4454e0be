use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, UserId};

pub type TransferId = Uuid;

/// Audit entry for a committed peer-to-peer transfer. Written in the same
/// unit of work as the balance mutations it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: TransferId,
    /// Sender (balance decreases)
    pub from_user: UserId,
    /// Receiver (balance increases)
    pub to_user: UserId,
    /// Amount in cents (always positive)
    pub amount: Cents,
    pub timestamp: DateTime<Utc>,
    /// Caller-supplied token that makes a retried request a no-op
    pub idempotency_key: Option<String>,
}

impl TransferRecord {
    pub fn new(from_user: UserId, to_user: UserId, amount: Cents) -> Self {
        assert!(amount > 0, "Transfer amount must be positive");
        Self {
            id: Uuid::new_v4(),
            from_user,
            to_user,
            amount,
            timestamp: Utc::now(),
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Funds entering the system for a user (wallet funding).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: Uuid,
    pub user_id: UserId,
    pub amount: Cents,
    pub timestamp: DateTime<Utc>,
}

impl Deposit {
    pub fn new(user_id: UserId, amount: Cents) -> Self {
        assert!(amount > 0, "Deposit amount must be positive");
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_transfer_record() {
        let (from, to) = (Uuid::new_v4(), Uuid::new_v4());
        let record = TransferRecord::new(from, to, 5000).with_idempotency_key("req-1");

        assert_eq!(record.amount, 5000);
        assert_eq!(record.from_user, from);
        assert_eq!(record.to_user, to);
        assert_eq!(record.idempotency_key.as_deref(), Some("req-1"));
    }

    #[test]
    #[should_panic(expected = "Transfer amount must be positive")]
    fn test_transfer_requires_positive_amount() {
        TransferRecord::new(Uuid::new_v4(), Uuid::new_v4(), 0);
    }
}
