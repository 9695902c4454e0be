mod balance;
mod ledger;
mod money;
mod transfer;
mod user;

pub use balance::*;
pub use ledger::*;
pub use money::*;
pub use transfer::*;
pub use user::*;
