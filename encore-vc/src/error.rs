//! Error types for the voting core
//!
//! `VoteError` is what callers of the voting session see. `LedgerError` and
//! `FeedError` are the transport-level failures of the ledger and feed
//! clients; the session classifies them into `VoteError`.

use encore_common::votes::VoteRejection;
use encore_common::{VoteReceipt, DAILY_VOTE_LIMIT, SHOW_VOTE_LIMIT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Flat classification of [`VoteError`], stable across the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteErrorKind {
    Unauthenticated,
    AlreadyVoted,
    ShowQuotaExceeded,
    DailyQuotaExceeded,
    SubmissionFailed,
    ConnectionLost,
}

/// Voting errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("sign in or continue anonymously to vote")]
    Unauthenticated,

    #[error("you have already voted for this song")]
    AlreadyVoted,

    #[error("you have used all {} votes for this show", SHOW_VOTE_LIMIT)]
    ShowQuotaExceeded,

    #[error("you have used all {} votes for today", DAILY_VOTE_LIMIT)]
    DailyQuotaExceeded,

    /// The ledger write did not go through; optimistic state was rolled back
    #[error("vote could not be recorded: {0}")]
    SubmissionFailed(String),

    /// Realtime feed dropped; voting keeps working against cached counts
    #[error("live updates unavailable: {0}")]
    ConnectionLost(String),
}

impl VoteError {
    pub fn kind(&self) -> VoteErrorKind {
        match self {
            VoteError::Unauthenticated => VoteErrorKind::Unauthenticated,
            VoteError::AlreadyVoted => VoteErrorKind::AlreadyVoted,
            VoteError::ShowQuotaExceeded => VoteErrorKind::ShowQuotaExceeded,
            VoteError::DailyQuotaExceeded => VoteErrorKind::DailyQuotaExceeded,
            VoteError::SubmissionFailed(_) => VoteErrorKind::SubmissionFailed,
            VoteError::ConnectionLost(_) => VoteErrorKind::ConnectionLost,
        }
    }

    /// Whether a manual retry by the user can succeed
    ///
    /// Retrying a failed submission is harmless: the ledger's uniqueness
    /// constraint turns a duplicate into `AlreadyVoted`.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VoteError::SubmissionFailed(_) | VoteError::ConnectionLost(_))
    }
}

impl From<LedgerError> for VoteError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(VoteRejection::AlreadyVoted) => VoteError::AlreadyVoted,
            LedgerError::Rejected(VoteRejection::ShowLimitReached) => VoteError::ShowQuotaExceeded,
            LedgerError::Rejected(VoteRejection::DailyLimitReached) => VoteError::DailyQuotaExceeded,
            LedgerError::Unauthenticated => VoteError::Unauthenticated,
            other => VoteError::SubmissionFailed(other.to_string()),
        }
    }
}

/// Structured result of one vote attempt, for callers that want a flat record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub success: bool,
    pub song_slot_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<VoteErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VoteOutcome {
    pub fn from_result(song_slot_id: Uuid, result: &Result<VoteReceipt, VoteError>) -> Self {
        match result {
            Ok(receipt) => Self {
                success: true,
                song_slot_id,
                new_count: Some(receipt.new_count),
                error: None,
                message: None,
            },
            Err(e) => Self {
                success: false,
                song_slot_id,
                new_count: None,
                error: Some(e.kind()),
                message: Some(e.to_string()),
            },
        }
    }
}

/// Ledger client errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Policy refusal (duplicate vote, show limit, daily limit)
    #[error("vote rejected: {0}")]
    Rejected(VoteRejection),

    #[error("not authenticated")]
    Unauthenticated,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("ledger error {0}: {1}")]
    Api(u16, String),

    #[error("parse error: {0}")]
    Parse(String),

    /// In-process store failure
    #[error("store error: {0}")]
    Store(String),
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LedgerError::Parse(err.to_string())
        } else {
            LedgerError::Network(err.to_string())
        }
    }
}

impl From<encore_common::Error> for LedgerError {
    fn from(err: encore_common::Error) -> Self {
        match err {
            encore_common::Error::Rejected(VoteRejection::NotFound) => {
                LedgerError::NotFound("song slot".to_string())
            }
            encore_common::Error::Rejected(rejection) => LedgerError::Rejected(rejection),
            encore_common::Error::NotFound(what) => LedgerError::NotFound(what),
            other => LedgerError::Store(other.to_string()),
        }
    }
}

/// Realtime feed errors
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("feed endpoint returned {0}")]
    Status(u16),

    #[error("stream error: {0}")]
    Stream(String),

    /// The subscriber fell behind and `{0}` events were skipped
    #[error("feed lagged, {0} events skipped")]
    Lagged(u64),
}
