use thiserror::Error;

use crate::domain::Cents;

/// Errors from account management operations (registration, funding, reads).
#[derive(Error, Debug)]
pub enum AppError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    #[error("Invalid handle: {0:?}")]
    InvalidHandle(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NonPositiveAmount(amount) => {
                AppError::InvalidAmount(format!("amount must be positive, got {}", amount))
            }
            LedgerError::InsufficientFunds { available, required } => AppError::InvalidAmount(
                format!("balance {} cannot cover {}", available, required),
            ),
            LedgerError::StoreUnavailable(e) => AppError::Database(e),
            other @ LedgerError::IdempotencyKeyReused(_) => AppError::Database(other.into()),
        }
    }
}

/// Failures of a single ledger unit of work. None of them leave a partial
/// mutation behind.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Cents),

    #[error("Insufficient funds: balance {available}, required {required}")]
    InsufficientFunds { available: Cents, required: Cents },

    #[error("Idempotency key {0:?} was already used for a different transfer")]
    IdempotencyKeyReused(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] anyhow::Error),
}

/// Everything a peer-to-peer transfer request can fail with.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("No authenticated user for this request")]
    Unauthenticated,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("Sender and recipient are the same user")]
    SelfTransfer,

    #[error("Idempotency key {0:?} was already used for a different transfer")]
    IdempotencyKeyReused(String),

    #[error("Insufficient funds: balance {available}, required {required}")]
    InsufficientFunds { available: Cents, required: Cents },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),
}

impl TransferError {
    /// Only infrastructure faults may be retried with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::StoreUnavailable(_))
    }

    /// Short description safe to show to the person who sent the request.
    pub fn user_message(&self) -> &'static str {
        match self {
            TransferError::Unauthenticated => "Error while sending",
            TransferError::InvalidAmount(_) => "Invalid amount",
            TransferError::RecipientNotFound(_) => "User not found",
            TransferError::SelfTransfer => "Cannot send money to yourself",
            TransferError::IdempotencyKeyReused(_) => "Duplicate request",
            TransferError::InsufficientFunds { .. } => "Insufficient funds",
            TransferError::StoreUnavailable(_) => "Transfer failed",
        }
    }
}

impl From<LedgerError> for TransferError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NonPositiveAmount(amount) => {
                TransferError::InvalidAmount(format!("amount must be positive, got {}", amount))
            }
            LedgerError::InsufficientFunds {
                available,
                required,
            } => TransferError::InsufficientFunds {
                available,
                required,
            },
            LedgerError::IdempotencyKeyReused(key) => TransferError::IdempotencyKeyReused(key),
            LedgerError::StoreUnavailable(e) => TransferError::StoreUnavailable(e),
        }
    }
}

impl From<anyhow::Error> for TransferError {
    fn from(err: anyhow::Error) -> Self {
        TransferError::StoreUnavailable(err)
    }
}
