//! Quota Tracker
//!
//! Local mirror of the voter's daily and per-show usage. The ledger enforces
//! the limits; this only decides whether to attempt a vote and what the UI
//! shows.

use crate::error::VoteError;
use crate::identity::VoterIdentity;
use crate::ledger::VoteLedger;
use encore_common::{QuotaUsage, DAILY_VOTE_LIMIT, SHOW_VOTE_LIMIT};
use tracing::{debug, warn};
use uuid::Uuid;

/// Confirmed usage as last reported by the ledger, plus reservations for
/// votes still in flight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaTracker {
    daily_confirmed: u32,
    show_confirmed: u32,
    in_flight: u32,
}

impl QuotaTracker {
    pub fn from_usage(usage: QuotaUsage) -> Self {
        let mut tracker = Self::default();
        tracker.set_confirmed(usage);
        tracker
    }

    /// Load usage and the already-voted slots from the ledger
    ///
    /// Fails soft: an unidentified voter or a failed read yields zero usage
    /// and no voted slots.
    pub async fn load(
        ledger: &dyn VoteLedger,
        voter: Option<&VoterIdentity>,
        show_id: Uuid,
    ) -> (Self, Vec<Uuid>) {
        let Some(voter) = voter.filter(|v| v.is_identified()) else {
            debug!(%show_id, "No voter identity, quota starts at zero");
            return (Self::default(), Vec::new());
        };

        match ledger.user_vote_state(voter, show_id).await {
            Ok(state) => (Self::from_usage(state.usage), state.voted_slots),
            Err(e) => {
                warn!(user_id = %voter.user_id, %show_id, error = %e, "Failed to load vote state, assuming zero usage");
                (Self::default(), Vec::new())
            }
        }
    }

    /// Claim one vote, show limit checked first
    pub fn reserve(&mut self) -> Result<(), VoteError> {
        let (daily, show) = self.counted();
        if show >= SHOW_VOTE_LIMIT {
            return Err(VoteError::ShowQuotaExceeded);
        }
        if daily >= DAILY_VOTE_LIMIT {
            return Err(VoteError::DailyQuotaExceeded);
        }
        self.in_flight += 1;
        Ok(())
    }

    /// Settle one reservation with the ledger's authoritative usage
    ///
    /// The server usage already includes the settled vote; reservations of
    /// other votes still in flight stay counted on top of it.
    pub fn commit(&mut self, usage: QuotaUsage) {
        self.set_confirmed(usage);
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Drop a reservation whose vote was not recorded
    pub fn rollback(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight
    }

    pub fn usage(&self) -> QuotaUsage {
        let (daily, show) = self.counted();
        QuotaUsage::from_counts(daily, show)
    }

    /// Either limit is known to be reached
    pub fn is_exhausted(&self) -> bool {
        let (daily, show) = self.counted();
        show >= SHOW_VOTE_LIMIT || daily >= DAILY_VOTE_LIMIT
    }

    fn set_confirmed(&mut self, usage: QuotaUsage) {
        self.daily_confirmed = usage.daily_used.min(DAILY_VOTE_LIMIT);
        self.show_confirmed = usage.show_used.min(SHOW_VOTE_LIMIT);
    }

    /// (daily, show) including in-flight reservations
    fn counted(&self) -> (u32, u32) {
        (
            self.daily_confirmed + self.in_flight,
            self.show_confirmed + self.in_flight,
        )
    }
}
