use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Cents, TransferRecord, User, UserId, cents_from_number, normalize_handle};
use crate::storage::Repository;

use super::{AccountLedger, TransferError};

pub const TRANSFER_SUCCESS_MESSAGE: &str = "Transfer successful";

/// Identity of the authenticated caller, supplied by whatever authenticates
/// requests. The transfer service trusts it as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

/// A request to send money to another user by handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub recipient_handle: String,
    /// Amount in cents
    pub amount: Cents,
    /// Optional token making client retries safe
    pub idempotency_key: Option<String>,
}

impl TransferRequest {
    pub fn new(recipient_handle: impl Into<String>, amount: Cents) -> Self {
        Self {
            recipient_handle: recipient_handle.into(),
            amount,
            idempotency_key: None,
        }
    }

    /// Build a request from a raw numeric amount in minor units.
    pub fn from_number(recipient_handle: impl Into<String>, amount: f64) -> Result<Self, TransferError> {
        let amount = cents_from_number(amount)
            .map_err(|e| TransferError::InvalidAmount(e.to_string()))?;
        Ok(Self::new(recipient_handle, amount))
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// A transfer that went through (or was already applied under the same key).
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub record: TransferRecord,
    pub recipient: User,
    pub replayed: bool,
}

/// Plain result object handed back to the caller of [`TransferService::p2p_transfer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub message: String,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        self.message == TRANSFER_SUCCESS_MESSAGE
    }
}

/// Validates transfer requests and drives the ledger. Holds no state between
/// calls.
#[derive(Clone)]
pub struct TransferService {
    repo: Repository,
    ledger: AccountLedger,
}

impl TransferService {
    pub fn new(repo: Repository, ledger: AccountLedger) -> Self {
        Self { repo, ledger }
    }

    /// Send money from the session user to the user owning `recipient_handle`.
    ///
    /// Not idempotent unless the request carries an idempotency key: calling
    /// twice with the same arguments performs two transfers. A key already
    /// used for a different transfer is refused by the ledger.
    pub async fn execute(
        &self,
        session: Option<&Session>,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, TransferError> {
        let sender = session.ok_or(TransferError::Unauthenticated)?.user_id;

        if request.amount <= 0 {
            return Err(TransferError::InvalidAmount(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }

        let handle = normalize_handle(&request.recipient_handle)
            .ok_or_else(|| TransferError::RecipientNotFound(request.recipient_handle.clone()))?;
        let recipient = self
            .repo
            .find_user_by_handle(&handle)
            .await?
            .ok_or_else(|| TransferError::RecipientNotFound(handle.clone()))?;

        if recipient.id == sender {
            return Err(TransferError::SelfTransfer);
        }

        let applied = self
            .ledger
            .apply_transfer(
                sender,
                recipient.id,
                request.amount,
                request.idempotency_key.as_deref(),
            )
            .await?;

        let replayed = applied.is_replay();
        let record = applied.into_record();

        Ok(TransferReceipt {
            record,
            recipient,
            replayed,
        })
    }

    /// Request/response entry point: never fails, reports every outcome as a
    /// short message without internal detail.
    pub async fn p2p_transfer(
        &self,
        session: Option<&Session>,
        recipient_handle: &str,
        amount: f64,
    ) -> TransferOutcome {
        let result = match (session, TransferRequest::from_number(recipient_handle, amount)) {
            (None, _) => Err(TransferError::Unauthenticated),
            (Some(_), Err(e)) => Err(e),
            (Some(_), Ok(request)) => self.execute(session, &request).await.map(|_| ()),
        };
        Self::outcome(result)
    }

    /// Map a transfer result to the message shown to the sender.
    pub fn outcome(result: Result<(), TransferError>) -> TransferOutcome {
        let message = match result {
            Ok(()) => TRANSFER_SUCCESS_MESSAGE,
            Err(e) => {
                if e.is_retryable() {
                    warn!(error = %e, "Transfer failed, caller may retry");
                } else {
                    debug!(error = %e, "Transfer refused");
                }
                e.user_message()
            }
        };
        TransferOutcome {
            message: message.to_string(),
        }
    }
}
