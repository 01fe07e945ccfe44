//! # Encore Common Library
//!
//! Shared code for the Encore setlist-voting services including:
//! - Vote policy constants and ledger wire types
//! - Event types (VoteEvent enum) and the EventBus
//! - Configuration loading
//! - SQLite schema and the authoritative vote ledger
//! - SSE helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;
pub mod votes;

pub use error::{Error, Result};
pub use votes::{QuotaUsage, UserVoteState, VoteReceipt, VoteRejection};
pub use votes::{DAILY_VOTE_LIMIT, SHOW_VOTE_LIMIT};
