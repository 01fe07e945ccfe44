//! HTTP API handlers for encore-ls

pub mod buildinfo;
pub mod health;
pub mod identity;
pub mod shows;
pub mod sse;
pub mod votes;

pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use identity::Voter;
pub use shows::{create_setlist, create_show, get_setlist, get_show, suggest_song};
pub use sse::event_stream;
pub use votes::{get_my_votes, get_vote_counts, submit_vote};
