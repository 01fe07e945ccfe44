//! Database schema, models and the authoritative vote ledger

pub mod init;
pub mod ledger;
pub mod models;

pub use init::*;
pub use ledger::SqliteLedger;
pub use models::*;
