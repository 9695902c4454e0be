// Application layer - use cases and orchestration.
// AccountLedger owns every balance mutation; TransferService validates
// peer-to-peer requests in front of it; WalletService is the facade the
// CLI (and any other client) talks to.

pub mod error;
pub mod ledger;
pub mod service;
pub mod transfer;

pub use error::*;
pub use ledger::*;
pub use service::*;
pub use transfer::*;
