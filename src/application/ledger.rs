use std::time::Duration;

use anyhow::{Context, anyhow};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{Balance, BalanceLookup, Cents, Deposit, TransferRecord, UserId};
use crate::storage::Repository;

use super::LedgerError;

/// Result of a transfer that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Balances were mutated and the record committed by this call.
    Committed(TransferRecord),
    /// The idempotency key matched an earlier transfer; nothing was mutated.
    Replayed(TransferRecord),
}

/// A unit of work that finished its writes and waits for COMMIT.
enum Staged {
    Ready(Transaction<'static, Sqlite>, TransferRecord),
    Replayed(TransferRecord),
}

impl Applied {
    pub fn into_record(self) -> TransferRecord {
        match self {
            Applied::Committed(record) | Applied::Replayed(record) => record,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, Applied::Replayed(_))
    }
}

/// Sole writer of the balances table.
///
/// Each operation runs as one SQLite transaction whose writes are bounded by
/// `timeout`. Every unit of work starts with a write, so it holds the
/// database write lock before it reads anything: concurrent units touching
/// the same rows are serialized by SQLite and wait for each other up to the
/// busy timeout.
#[derive(Clone)]
pub struct AccountLedger {
    repo: Repository,
    timeout: Duration,
}

impl AccountLedger {
    pub fn new(repo: Repository, timeout: Duration) -> Self {
        Self { repo, timeout }
    }

    /// Move `amount` from `from` to `to` as one atomic unit.
    ///
    /// Fails with `InsufficientFunds` if the sender has no balance row or less
    /// than `amount` available. On any failure, timeout included, the
    /// transaction is rolled back and neither balance changes.
    ///
    /// The deadline bounds the work up to COMMIT. Once COMMIT is issued the
    /// call waits for its outcome, so a reported failure never hides a
    /// transfer that was applied.
    #[instrument(skip(self, idempotency_key), fields(from = %from, to = %to))]
    pub async fn apply_transfer(
        &self,
        from: UserId,
        to: UserId,
        amount: Cents,
        idempotency_key: Option<&str>,
    ) -> Result<Applied, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::NonPositiveAmount(amount));
        }

        let staged = self
            .within_deadline("transfer", self.stage_transfer(from, to, amount, idempotency_key))
            .await;
        let result = match staged {
            Ok(Staged::Ready(tx, record)) => self.commit_transfer(tx, record).await,
            Ok(Staged::Replayed(record)) => Ok(Applied::Replayed(record)),
            Err(e) => Err(e),
        };

        match &result {
            Ok(Applied::Committed(record)) => {
                info!(transfer_id = %record.id, amount, "Transfer committed")
            }
            Ok(Applied::Replayed(record)) => {
                info!(transfer_id = %record.id, "Transfer replayed from idempotency key")
            }
            Err(LedgerError::StoreUnavailable(e)) => {
                error!(error = %e, "Transfer rolled back")
            }
            Err(e) => warn!(error = %e, "Transfer rejected"),
        }

        result
    }

    async fn stage_transfer(
        &self,
        from: UserId,
        to: UserId,
        amount: Cents,
        idempotency_key: Option<&str>,
    ) -> Result<Staged, LedgerError> {
        let mut tx = self.repo.begin().await?;

        // Debit first: this statement takes the write lock for the whole unit.
        let remaining = Repository::debit_balance(&mut *tx, from, amount).await?;

        if let Some(key) = idempotency_key {
            if let Some(existing) = Repository::find_transfer_by_key(&mut *tx, key).await? {
                tx.rollback().await.context("Failed to roll back replayed transfer")?;
                if existing.from_user != from || existing.to_user != to || existing.amount != amount {
                    return Err(LedgerError::IdempotencyKeyReused(key.to_string()));
                }
                return Ok(Staged::Replayed(existing));
            }
        }

        let Some(remaining) = remaining else {
            let available = Repository::find_balance(&mut *tx, from).await?.available();
            tx.rollback().await.context("Failed to roll back transfer")?;
            return Err(LedgerError::InsufficientFunds {
                available,
                required: amount,
            });
        };
        debug!(remaining, "Sender debited");

        Self::credit_within(&mut *tx, to, amount).await?;

        let mut record = TransferRecord::new(from, to, amount);
        if let Some(key) = idempotency_key {
            record = record.with_idempotency_key(key);
        }
        Repository::insert_transfer(&mut *tx, &record).await?;

        Ok(Staged::Ready(tx, record))
    }

    async fn commit_transfer(
        &self,
        tx: Transaction<'static, Sqlite>,
        record: TransferRecord,
    ) -> Result<Applied, LedgerError> {
        let Err(commit_err) = tx.commit().await else {
            return Ok(Applied::Committed(record));
        };

        // The connection can fail after SQLite already made the commit durable
        match self.repo.get_transfer(record.id).await {
            Ok(Some(_)) => {
                warn!(
                    transfer_id = %record.id,
                    error = %commit_err,
                    "Commit reported an error but the transfer landed"
                );
                Ok(Applied::Committed(record))
            }
            _ => Err(LedgerError::StoreUnavailable(
                anyhow::Error::new(commit_err).context("Failed to commit transfer"),
            )),
        }
    }

    /// Fund a user's wallet from outside the system.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn credit(&self, user: UserId, amount: Cents) -> Result<Deposit, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::NonPositiveAmount(amount));
        }

        let result = match self
            .within_deadline("deposit", self.stage_credit(user, amount))
            .await
        {
            Ok((tx, deposit)) => tx
                .commit()
                .await
                .context("Failed to commit deposit")
                .map(|()| deposit)
                .map_err(LedgerError::from),
            Err(e) => Err(e),
        };

        match &result {
            Ok(deposit) => info!(deposit_id = %deposit.id, amount, "Deposit committed"),
            Err(e) => error!(error = %e, "Deposit rolled back"),
        }

        result
    }

    async fn stage_credit(
        &self,
        user: UserId,
        amount: Cents,
    ) -> Result<(Transaction<'static, Sqlite>, Deposit), LedgerError> {
        let mut tx = self.repo.begin().await?;

        let deposit = Deposit::new(user, amount);
        Repository::insert_deposit(&mut *tx, &deposit).await?;
        Self::credit_within(&mut *tx, user, amount).await?;

        Ok((tx, deposit))
    }

    /// Run the pre-commit part of a unit of work under the store deadline.
    /// Expiry drops the open transaction, which rolls it back.
    async fn within_deadline<T>(
        &self,
        what: &str,
        unit: impl Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, LedgerError> {
        tokio::time::timeout(self.timeout, unit)
            .await
            .unwrap_or_else(|_| {
                Err(LedgerError::StoreUnavailable(anyhow!(
                    "{} did not complete within {:?}",
                    what,
                    self.timeout
                )))
            })
    }

    /// Add `amount` to a user's balance, creating the row on first credit.
    ///
    /// Must run after the unit of work has already written, so the lookup and
    /// the insert cannot race another writer.
    async fn credit_within(
        conn: &mut SqliteConnection,
        user: UserId,
        amount: Cents,
    ) -> anyhow::Result<Cents> {
        match Repository::find_balance(&mut *conn, user).await? {
            BalanceLookup::Found(_) => Repository::increment_balance(&mut *conn, user, amount).await,
            BalanceLookup::NotFound => {
                let balance = Balance::opening(user, amount);
                Repository::insert_balance(&mut *conn, &balance).await?;
                debug!(user = %user, "Opened balance on first credit");
                Ok(balance.amount)
            }
        }
    }
}
