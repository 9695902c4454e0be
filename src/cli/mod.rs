use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::application::{TransferRequest, TransferService, WalletService};
use crate::config::{AppConfig, DEFAULT_DATABASE_PATH};
use crate::domain::{format_cents, parse_cents};

/// Remit - peer-to-peer wallet ledger
#[derive(Parser)]
#[command(name = "remit")]
#[command(about = "A wallet ledger with atomic peer-to-peer transfers")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "REMIT_DATABASE", default_value = DEFAULT_DATABASE_PATH)]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// User management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Fund a user's wallet
    Deposit {
        /// Amount to add (e.g., "50.00" or "50")
        amount: String,

        /// Handle of the user to fund
        #[arg(long)]
        to: String,
    },

    /// Show balance for a user
    Balance {
        /// User handle
        handle: String,
    },

    /// Send money to another user
    Send {
        /// Amount to send (e.g., "50.00" or "50")
        amount: String,

        /// Handle of the authenticated sender
        #[arg(long)]
        from: String,

        /// Handle of the recipient
        #[arg(long)]
        to: String,

        /// Idempotency key; retrying with the same key never sends twice
        #[arg(long)]
        key: Option<String>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify ledger integrity
    Check,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a new user
    Register {
        /// Unique handle (e.g. phone number)
        handle: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show a user
    Show {
        /// User handle
        handle: String,
    },

    /// List all users
    List,
}

impl Cli {
    /// Effective configuration: environment first, then command-line overrides.
    pub fn config(&self) -> Result<AppConfig> {
        let config = AppConfig::from_env().context("Invalid configuration")?;
        Ok(config.with_database_path(&self.database))
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config()?;

        match self.command {
            Commands::Init => {
                WalletService::init_with(&config).await?;
                println!("Database initialized: {}", config.database_path);
            }

            Commands::User(user_cmd) => {
                let service = WalletService::connect_with(&config).await?;
                run_user_command(&service, user_cmd).await?;
            }

            Commands::Deposit { amount, to } => {
                let service = WalletService::connect_with(&config).await?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                let deposit = service.deposit(&to, amount_cents).await?;
                println!(
                    "Deposited {} to {} ({})",
                    format_cents(deposit.amount),
                    to,
                    deposit.id
                );
            }

            Commands::Balance { handle } => {
                let service = WalletService::connect_with(&config).await?;
                let entry = service.get_balance(&handle).await?;
                println!(
                    "{}: {} available, {} locked",
                    entry.user.display_name(),
                    format_cents(entry.balance.amount),
                    format_cents(entry.balance.locked)
                );
            }

            Commands::Send {
                amount,
                from,
                to,
                key,
                json,
            } => {
                let service = WalletService::connect_with(&config).await?;
                run_send_command(&service, &amount, &from, &to, key, json).await?;
            }

            Commands::Check => {
                let service = WalletService::connect_with(&config).await?;
                run_check_command(&service).await?;
            }
        }

        Ok(())
    }
}

async fn run_user_command(service: &WalletService, cmd: UserCommands) -> Result<()> {
    match cmd {
        UserCommands::Register { handle, name } => {
            let user = service.register_user(&handle, name).await?;
            println!("Registered user: {} ({})", user.handle, user.id);
        }

        UserCommands::Show { handle } => {
            let user = service.get_user(&handle).await?;
            println!("User:    {}", user.handle);
            println!("ID:      {}", user.id);
            if let Some(name) = &user.name {
                println!("Name:    {}", name);
            }
            println!("Created: {}", user.created_at.format("%Y-%m-%d %H:%M"));
        }

        UserCommands::List => {
            let users = service.list_users().await?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<20} {:<24} {:<36}", "HANDLE", "NAME", "ID");
                println!("{}", "-".repeat(82));
                for user in users {
                    println!(
                        "{:<20} {:<24} {:<36}",
                        user.handle,
                        user.name.as_deref().unwrap_or("-"),
                        user.id
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_send_command(
    service: &WalletService,
    amount: &str,
    from: &str,
    to: &str,
    key: Option<String>,
    json: bool,
) -> Result<()> {
    // The --from handle is taken as the authenticated caller
    let session = service.session_for(from).await.ok();

    let result = match parse_cents(amount) {
        Ok(amount_cents) => {
            let mut request = TransferRequest::new(to, amount_cents);
            if let Some(key) = key {
                request = request.with_idempotency_key(key);
            }
            service.send(session.as_ref(), &request).await
        }
        Err(e) => Err(crate::application::TransferError::InvalidAmount(e.to_string())),
    };

    let receipt = result.as_ref().ok().cloned();
    let outcome = TransferService::outcome(result.map(|_| ()));

    if json {
        println!("{}", serde_json::to_string(&outcome)?);
    } else {
        println!("{}", outcome.message);
        if let Some(receipt) = receipt {
            println!(
                "  {} -> {}: {} ({}{})",
                from,
                receipt.recipient.handle,
                format_cents(receipt.record.amount),
                receipt.record.id,
                if receipt.replayed { ", already applied" } else { "" }
            );
        }
    }

    if !outcome.is_success() {
        anyhow::bail!("Transfer not completed");
    }
    Ok(())
}

async fn run_check_command(service: &WalletService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Users:     {}", report.user_count);
    println!("Balances:  {}", report.balance_count);
    println!("Deposits:  {}", report.deposit_count);
    println!("Transfers: {}", report.transfer_count);
    println!();
    println!("  {:<16} {:>12}", "Total balance:", format_cents(report.total_balance));
    println!(
        "  {:<16} {:>12}  {}",
        "Total deposited:",
        format_cents(report.total_deposited),
        if report.total_balance == report.total_deposited {
            "OK"
        } else {
            "UNBALANCED!"
        }
    );
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        for d in &report.discrepancies {
            println!(
                "    user {}: recorded {}, expected {}",
                d.user_id,
                format_cents(d.recorded),
                format_cents(d.expected)
            );
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}
