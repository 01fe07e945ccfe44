//! Vote policy and ledger wire types
//!
//! Shared by the ledger service (which enforces the policy authoritatively)
//! and the voting core (which mirrors it as an optimistic UI hint).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Maximum votes one user may cast per UTC day, across all shows
pub const DAILY_VOTE_LIMIT: u32 = 50;

/// Maximum votes one user may cast for the songs of a single show
pub const SHOW_VOTE_LIMIT: u32 = 10;

/// Request header carrying the voter's user id
pub const USER_HEADER: &str = "x-encore-user";

/// Optional request header carrying the voter's display name
pub const NAME_HEADER: &str = "x-encore-name";

/// A user's quota consumption, as reported by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub daily_used: u32,
    pub daily_remaining: u32,
    pub show_used: u32,
    pub show_remaining: u32,
}

impl QuotaUsage {
    /// Build usage from raw vote counts, clamping to the policy caps
    pub fn from_counts(daily_used: u32, show_used: u32) -> Self {
        let daily_used = daily_used.min(DAILY_VOTE_LIMIT);
        let show_used = show_used.min(SHOW_VOTE_LIMIT);
        Self {
            daily_used,
            daily_remaining: DAILY_VOTE_LIMIT - daily_used,
            show_used,
            show_remaining: SHOW_VOTE_LIMIT - show_used,
        }
    }

    /// Usage of a user who has not voted (also the fail-soft default)
    pub fn zero() -> Self {
        Self::from_counts(0, 0)
    }
}

impl Default for QuotaUsage {
    fn default() -> Self {
        Self::zero()
    }
}

/// Everything the voting core needs to know about one user in one show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserVoteState {
    pub user_id: String,
    pub show_id: Uuid,
    /// Song slots of this show the user has already voted for
    pub voted_slots: Vec<Uuid>,
    #[serde(flatten)]
    pub usage: QuotaUsage,
}

/// Successful vote submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub vote_id: Uuid,
    pub song_slot_id: Uuid,
    pub setlist_id: Uuid,
    /// Slot counter after the increment
    pub new_count: i64,
    #[serde(flatten)]
    pub usage: QuotaUsage,
}

/// Structured reasons the ledger refuses a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteRejection {
    AlreadyVoted,
    ShowLimitReached,
    DailyLimitReached,
    NotFound,
}

impl VoteRejection {
    /// Wire code, as used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            VoteRejection::AlreadyVoted => "already_voted",
            VoteRejection::ShowLimitReached => "show_limit_reached",
            VoteRejection::DailyLimitReached => "daily_limit_reached",
            VoteRejection::NotFound => "not_found",
        }
    }

    /// Inverse of [`VoteRejection::code`]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "already_voted" => Some(VoteRejection::AlreadyVoted),
            "show_limit_reached" => Some(VoteRejection::ShowLimitReached),
            "daily_limit_reached" => Some(VoteRejection::DailyLimitReached),
            "not_found" => Some(VoteRejection::NotFound),
            _ => None,
        }
    }
}

impl fmt::Display for VoteRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            VoteRejection::AlreadyVoted => "you have already voted for this song",
            VoteRejection::ShowLimitReached => "show vote limit reached",
            VoteRejection::DailyLimitReached => "daily vote limit reached",
            VoteRejection::NotFound => "song slot not found",
        };
        f.write_str(message)
    }
}

/// POST /api/votes request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitVoteRequest {
    pub song_slot_id: Uuid,
}

/// GET /api/setlists/:id/counts response body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteCounts {
    pub setlist_id: Uuid,
    pub counts: HashMap<Uuid, i64>,
}

/// Error body returned by the ledger service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}
