// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::time::Duration;

use anyhow::Result;
use remit::application::{Session, WalletService};
use remit::domain::{Cents, User};
use remit::AppConfig;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(WalletService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = WalletService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to create a test service with a custom unit-of-work deadline
pub async fn test_service_with_timeout(timeout: Duration) -> Result<(WalletService, AppConfig, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let config = AppConfig::default()
        .with_database_path(db_path.to_str().unwrap())
        .with_store_timeout(timeout);
    let service = WalletService::init_with(&config).await?;
    Ok((service, config, temp_dir))
}

/// Register a user and fund them with `amount` cents (skipped when zero)
pub async fn funded_user(service: &WalletService, handle: &str, amount: Cents) -> Result<(User, Session)> {
    let user = service.register_user(handle, None).await?;
    if amount > 0 {
        service.deposit(handle, amount).await?;
    }
    Ok((user.clone(), Session::new(user.id)))
}

/// Current spendable amount for a handle
pub async fn amount_of(service: &WalletService, handle: &str) -> Result<Cents> {
    Ok(service.get_balance(handle).await?.balance.amount)
}
