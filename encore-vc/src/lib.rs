//! encore-vc library - Voting Core
//!
//! Rate-limited, optimistic, realtime-synchronized vote counting for one
//! voter looking at one show's setlist:
//! - [`VoteCountCache`]: local counts, optimistic deltas, authoritative overrides
//! - [`QuotaTracker`]: daily and per-show usage mirror
//! - [`feed`]: realtime feed adapter with retry/backoff
//! - [`VotingSession`]: the `vote()` entry point tying them together
//! - [`VoteLedger`] clients: in-process [`encore_common::db::SqliteLedger`] or [`HttpLedger`]

pub mod cache;
pub mod error;
pub mod feed;
pub mod http;
pub mod identity;
pub mod ledger;
pub mod quota;
pub mod session;

pub use cache::VoteCountCache;
pub use error::{FeedError, LedgerError, VoteError, VoteErrorKind, VoteOutcome};
pub use feed::{BusConnector, ConnectionState, FeedConfig, FeedConnector, FeedHandle, SseConnector};
pub use http::HttpLedger;
pub use identity::VoterIdentity;
pub use ledger::VoteLedger;
pub use quota::QuotaTracker;
pub use session::VotingSession;
