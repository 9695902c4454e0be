use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use uuid::Uuid;

use crate::domain::{
    Balance, BalanceLookup, Cents, Deposit, TransferId, TransferRecord, User, UserId,
};

use super::MIGRATION_001_INITIAL;

/// Statistics for ledger integrity verification.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub user_count: i64,
    pub deposit_count: i64,
    pub invalid_transfer_amounts: i64,
}

/// Repository for persisting and querying users, balances and transfer records.
///
/// Methods on `&self` run directly against the pool and are meant for reads
/// and single-statement writes. Associated functions taking a
/// `&mut SqliteConnection` are the building blocks of a unit of work: call
/// them with `&mut *tx` on a transaction obtained from [`Repository::begin`].
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database.
    ///
    /// Connections use WAL so display reads are not blocked by a writer, and
    /// enforce foreign keys so a balance or transfer can never reference an
    /// unknown user.
    pub async fn connect(database_url: &str, busy_timeout: Duration) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str, busy_timeout: Duration) -> Result<Self> {
        let repo = Self::connect(database_url, busy_timeout).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Start a unit of work. Dropping the transaction without committing
    /// rolls it back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }

    // ========================
    // User operations
    // ========================

    /// Save a new user.
    pub async fn save_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, handle, name, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.handle)
        .bind(&user.name)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save user")?;
        Ok(())
    }

    /// Get a user by internal id.
    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, handle, name, created_at FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    /// Resolve a handle to a user.
    pub async fn find_user_by_handle(&self, handle: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, handle, name, created_at FROM users WHERE handle = ?")
            .bind(handle)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by handle")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    /// List all users ordered by handle.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT id, handle, name, created_at FROM users ORDER BY handle")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list users")?;

        rows.iter().map(Self::row_to_user).collect()
    }

    fn row_to_user(row: &SqliteRow) -> Result<User> {
        let id: String = row.get("id");
        let created_at: String = row.get("created_at");

        Ok(User {
            id: Uuid::parse_str(&id).context("Invalid user ID")?,
            handle: row.get("handle"),
            name: row.get("name"),
            created_at: parse_timestamp(&created_at)?,
        })
    }

    // ========================
    // Balance reads
    // ========================

    /// Read a balance outside of any unit of work. Suitable for display only:
    /// the value may already be stale when it is shown.
    pub async fn get_balance(&self, user_id: UserId) -> Result<BalanceLookup> {
        let row = sqlx::query(
            "SELECT user_id, amount, locked, updated_at FROM balances WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch balance")?;

        Ok(row.as_ref().map(Self::row_to_balance).transpose()?.into())
    }

    /// List every balance row.
    pub async fn list_balances(&self) -> Result<Vec<Balance>> {
        let rows = sqlx::query("SELECT user_id, amount, locked, updated_at FROM balances")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list balances")?;

        rows.iter().map(Self::row_to_balance).collect()
    }

    fn row_to_balance(row: &SqliteRow) -> Result<Balance> {
        let user_id: String = row.get("user_id");
        let updated_at: String = row.get("updated_at");

        Ok(Balance {
            user_id: Uuid::parse_str(&user_id).context("Invalid balance user ID")?,
            amount: row.get("amount"),
            locked: row.get("locked"),
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    // ========================
    // Unit-of-work primitives
    // ========================

    /// Point lookup of a balance inside a unit of work.
    pub async fn find_balance(conn: &mut SqliteConnection, user_id: UserId) -> Result<BalanceLookup> {
        let row = sqlx::query(
            "SELECT user_id, amount, locked, updated_at FROM balances WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch balance")?;

        Ok(row.as_ref().map(Self::row_to_balance).transpose()?.into())
    }

    /// Decrement a balance only if it can cover `amount`.
    ///
    /// The check and the write happen in one statement, so two units of work
    /// debiting the same user can never both pass the check against the same
    /// starting value. Returns the remaining amount, or `None` when the row is
    /// missing or holds less than `amount`.
    pub async fn debit_balance(
        conn: &mut SqliteConnection,
        user_id: UserId,
        amount: Cents,
    ) -> Result<Option<Cents>> {
        let row = sqlx::query(
            r#"
            UPDATE balances
            SET amount = amount - ?, updated_at = ?
            WHERE user_id = ? AND amount >= ?
            RETURNING amount
            "#,
        )
        .bind(amount)
        .bind(Utc::now().to_rfc3339())
        .bind(user_id.to_string())
        .bind(amount)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to debit balance")?;

        Ok(row.map(|row| row.get("amount")))
    }

    /// Increment an existing balance. Fails if the row is missing or the new
    /// amount would overflow.
    pub async fn increment_balance(
        conn: &mut SqliteConnection,
        user_id: UserId,
        amount: Cents,
    ) -> Result<Cents> {
        let row = sqlx::query(
            r#"
            UPDATE balances
            SET amount = amount + ?, updated_at = ?
            WHERE user_id = ? AND amount <= ?
            RETURNING amount
            "#,
        )
        .bind(amount)
        .bind(Utc::now().to_rfc3339())
        .bind(user_id.to_string())
        .bind(Cents::MAX - amount)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to credit balance")?;

        match row {
            Some(row) => Ok(row.get("amount")),
            None => anyhow::bail!("Cannot credit {} cents to user {}", amount, user_id),
        }
    }

    /// Insert a new balance row.
    pub async fn insert_balance(conn: &mut SqliteConnection, balance: &Balance) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO balances (user_id, amount, locked, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(balance.user_id.to_string())
        .bind(balance.amount)
        .bind(balance.locked)
        .bind(balance.updated_at.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to create balance")?;
        Ok(())
    }

    // ========================
    // Transfer and deposit records
    // ========================

    /// Save a transfer record inside a unit of work.
    pub async fn insert_transfer(conn: &mut SqliteConnection, record: &TransferRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO p2p_transfers (id, from_user_id, to_user_id, amount, timestamp, idempotency_key)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.from_user.to_string())
        .bind(record.to_user.to_string())
        .bind(record.amount)
        .bind(record.timestamp.to_rfc3339())
        .bind(&record.idempotency_key)
        .execute(&mut *conn)
        .await
        .context("Failed to save transfer record")?;
        Ok(())
    }

    /// Find a committed transfer by its idempotency key.
    pub async fn find_transfer_by_key(
        conn: &mut SqliteConnection,
        key: &str,
    ) -> Result<Option<TransferRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, from_user_id, to_user_id, amount, timestamp, idempotency_key
            FROM p2p_transfers
            WHERE idempotency_key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch transfer by idempotency key")?;

        row.as_ref().map(Self::row_to_transfer).transpose()
    }

    /// Save a deposit record inside a unit of work.
    pub async fn insert_deposit(conn: &mut SqliteConnection, deposit: &Deposit) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO deposits (id, user_id, amount, timestamp)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(deposit.id.to_string())
        .bind(deposit.user_id.to_string())
        .bind(deposit.amount)
        .bind(deposit.timestamp.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to save deposit")?;
        Ok(())
    }

    /// Get a transfer record by ID.
    pub async fn get_transfer(&self, id: TransferId) -> Result<Option<TransferRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, from_user_id, to_user_id, amount, timestamp, idempotency_key
            FROM p2p_transfers
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transfer")?;

        row.as_ref().map(Self::row_to_transfer).transpose()
    }

    /// All transfer records, oldest first. Used for reconciliation.
    pub async fn list_transfers(&self) -> Result<Vec<TransferRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, from_user_id, to_user_id, amount, timestamp, idempotency_key
            FROM p2p_transfers
            ORDER BY timestamp, rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transfers")?;

        rows.iter().map(Self::row_to_transfer).collect()
    }

    /// Total deposited per user.
    pub async fn deposits_by_user(&self) -> Result<HashMap<UserId, Cents>> {
        let rows = sqlx::query(
            "SELECT user_id, SUM(amount) as total FROM deposits GROUP BY user_id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to sum deposits")?;

        let mut totals = HashMap::new();
        for row in rows {
            let user_id: String = row.get("user_id");
            let total: i64 = row.get("total");
            totals.insert(
                Uuid::parse_str(&user_id).context("Invalid deposit user ID")?,
                total,
            );
        }
        Ok(totals)
    }

    fn row_to_transfer(row: &SqliteRow) -> Result<TransferRecord> {
        let id: String = row.get("id");
        let from_user: String = row.get("from_user_id");
        let to_user: String = row.get("to_user_id");
        let timestamp: String = row.get("timestamp");

        Ok(TransferRecord {
            id: Uuid::parse_str(&id).context("Invalid transfer ID")?,
            from_user: Uuid::parse_str(&from_user).context("Invalid sender ID")?,
            to_user: Uuid::parse_str(&to_user).context("Invalid receiver ID")?,
            amount: row.get("amount"),
            timestamp: parse_timestamp(&timestamp)?,
            idempotency_key: row.get("idempotency_key"),
        })
    }

    // ========================
    // Integrity
    // ========================

    /// Get statistics for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats> {
        let user_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let deposit_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM deposits")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let invalid_transfer_amounts: i64 =
            sqlx::query("SELECT COUNT(*) as count FROM p2p_transfers WHERE amount <= 0")
                .fetch_one(&self.pool)
                .await?
                .get("count");

        Ok(IntegrityStats {
            user_count,
            deposit_count,
            invalid_transfer_amounts,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .context("Invalid timestamp")?
        .with_timezone(&Utc))
}
