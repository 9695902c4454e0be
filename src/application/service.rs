use crate::config::AppConfig;
use crate::domain::{
    Balance, BalanceLookup, Cents, Deposit, IntegrityInputs, IntegrityReport, User,
    build_integrity_report, normalize_handle,
};
use crate::storage::Repository;

use super::{
    AccountLedger, AppError, Session, TransferError, TransferOutcome, TransferReceipt,
    TransferRequest, TransferService,
};

/// Application service providing high-level wallet operations.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
#[derive(Clone)]
pub struct WalletService {
    repo: Repository,
    ledger: AccountLedger,
    transfers: TransferService,
}

/// Balance entry for a user
pub struct BalanceEntry {
    pub user: User,
    pub balance: Balance,
}

impl WalletService {
    /// Create a new wallet service with the given repository.
    pub fn new(repo: Repository, config: &AppConfig) -> Self {
        let ledger = AccountLedger::new(repo.clone(), config.store_timeout);
        let transfers = TransferService::new(repo.clone(), ledger.clone());
        Self {
            repo,
            ledger,
            transfers,
        }
    }

    /// Initialize a new database at the given path with default settings.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        Self::init_with(&AppConfig::default().with_database_path(database_path)).await
    }

    /// Create (if needed) and migrate the database described by `config`.
    pub async fn init_with(config: &AppConfig) -> Result<Self, AppError> {
        let repo = Repository::init(&config.database_url(true), config.busy_timeout).await?;
        Ok(Self::new(repo, config))
    }

    /// Connect to an existing database with default settings.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        Self::connect_with(&AppConfig::default().with_database_path(database_path)).await
    }

    /// Connect to the existing database described by `config`.
    pub async fn connect_with(config: &AppConfig) -> Result<Self, AppError> {
        let repo = Repository::connect(&config.database_url(false), config.busy_timeout).await?;
        Ok(Self::new(repo, config))
    }

    pub fn ledger(&self) -> &AccountLedger {
        &self.ledger
    }

    // ========================
    // User operations
    // ========================

    /// Register a new user under a unique handle.
    pub async fn register_user(&self, handle: &str, name: Option<String>) -> Result<User, AppError> {
        let handle =
            normalize_handle(handle).ok_or_else(|| AppError::InvalidHandle(handle.to_string()))?;

        if self.repo.find_user_by_handle(&handle).await?.is_some() {
            return Err(AppError::UserAlreadyExists(handle));
        }

        let mut user = User::new(handle);
        if let Some(name) = name {
            user = user.with_name(name);
        }

        self.repo.save_user(&user).await?;
        Ok(user)
    }

    /// Get a user by handle.
    pub async fn get_user(&self, handle: &str) -> Result<User, AppError> {
        let normalized =
            normalize_handle(handle).ok_or_else(|| AppError::InvalidHandle(handle.to_string()))?;
        self.repo
            .find_user_by_handle(&normalized)
            .await?
            .ok_or(AppError::UserNotFound(normalized))
    }

    /// List all users.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(self.repo.list_users().await?)
    }

    /// Resolve a handle to a session. Stands in for an authentication layer;
    /// callers must only do this for an identity they have already verified.
    pub async fn session_for(&self, handle: &str) -> Result<Session, AppError> {
        Ok(Session::new(self.get_user(handle).await?.id))
    }

    // ========================
    // Balance operations
    // ========================

    /// Fund a user's wallet.
    pub async fn deposit(&self, handle: &str, amount: Cents) -> Result<Deposit, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }
        let user = self.get_user(handle).await?;
        Ok(self.ledger.credit(user.id, amount).await?)
    }

    /// Get the balance shown to a user. A user without a balance row sees zero.
    pub async fn get_balance(&self, handle: &str) -> Result<BalanceEntry, AppError> {
        let user = self.get_user(handle).await?;
        let balance = match self.repo.get_balance(user.id).await? {
            BalanceLookup::Found(balance) => balance,
            BalanceLookup::NotFound => Balance::empty(user.id),
        };
        Ok(BalanceEntry { user, balance })
    }

    // ========================
    // Transfer operations
    // ========================

    /// Send money on behalf of the session user.
    pub async fn send(
        &self,
        session: Option<&Session>,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, TransferError> {
        self.transfers.execute(session, request).await
    }

    /// Send money and report the outcome as a plain message.
    pub async fn p2p_transfer(
        &self,
        session: Option<&Session>,
        recipient_handle: &str,
        amount: f64,
    ) -> TransferOutcome {
        self.transfers
            .p2p_transfer(session, recipient_handle, amount)
            .await
    }

    // ========================
    // Integrity operations
    // ========================

    /// Reconcile balances against deposit and transfer history.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let stats = self.repo.get_integrity_stats().await?;
        let balances = self.repo.list_balances().await?;
        let deposits = self.repo.deposits_by_user().await?;
        let transfers = self.repo.list_transfers().await?;

        Ok(build_integrity_report(IntegrityInputs {
            user_count: stats.user_count,
            deposit_count: stats.deposit_count,
            invalid_transfer_amounts: stats.invalid_transfer_amounts,
            balances: &balances,
            deposits_by_user: &deposits,
            transfers: &transfers,
        }))
    }
}
