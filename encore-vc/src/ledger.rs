//! Vote ledger client trait
//!
//! The voting core only needs three operations from the authoritative
//! ledger. They are served in-process by [`SqliteLedger`] or over HTTP by
//! [`crate::http::HttpLedger`].

use crate::error::LedgerError;
use crate::identity::VoterIdentity;
use async_trait::async_trait;
use encore_common::db::SqliteLedger;
use encore_common::votes::VoteCounts;
use encore_common::{UserVoteState, VoteReceipt};
use std::sync::Arc;
use uuid::Uuid;

/// Authoritative vote ledger
#[async_trait]
pub trait VoteLedger: Send + Sync {
    /// Current `{song slot -> count}` for a setlist
    async fn vote_counts(&self, setlist_id: Uuid) -> Result<VoteCounts, LedgerError>;

    /// Voted slots and quota usage of one voter in one show
    async fn user_vote_state(
        &self,
        voter: &VoterIdentity,
        show_id: Uuid,
    ) -> Result<UserVoteState, LedgerError>;

    /// Atomic insert-and-increment
    ///
    /// Refusals come back as [`LedgerError::Rejected`] (or `NotFound` for an
    /// unknown slot).
    async fn submit_vote(
        &self,
        voter: &VoterIdentity,
        song_slot_id: Uuid,
    ) -> Result<VoteReceipt, LedgerError>;
}

#[async_trait]
impl VoteLedger for SqliteLedger {
    async fn vote_counts(&self, setlist_id: Uuid) -> Result<VoteCounts, LedgerError> {
        Ok(SqliteLedger::vote_counts(self, setlist_id).await?)
    }

    async fn user_vote_state(
        &self,
        voter: &VoterIdentity,
        show_id: Uuid,
    ) -> Result<UserVoteState, LedgerError> {
        Ok(SqliteLedger::user_vote_state(self, &voter.user_id, show_id).await?)
    }

    async fn submit_vote(
        &self,
        voter: &VoterIdentity,
        song_slot_id: Uuid,
    ) -> Result<VoteReceipt, LedgerError> {
        Ok(SqliteLedger::submit_vote(
            self,
            &voter.user_id,
            voter.display_name.as_deref(),
            song_slot_id,
        )
        .await?)
    }
}

#[async_trait]
impl<L: VoteLedger + ?Sized> VoteLedger for Arc<L> {
    async fn vote_counts(&self, setlist_id: Uuid) -> Result<VoteCounts, LedgerError> {
        (**self).vote_counts(setlist_id).await
    }

    async fn user_vote_state(
        &self,
        voter: &VoterIdentity,
        show_id: Uuid,
    ) -> Result<UserVoteState, LedgerError> {
        (**self).user_vote_state(voter, show_id).await
    }

    async fn submit_vote(
        &self,
        voter: &VoterIdentity,
        song_slot_id: Uuid,
    ) -> Result<VoteReceipt, LedgerError> {
        (**self).submit_vote(voter, song_slot_id).await
    }
}
