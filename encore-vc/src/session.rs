//! Vote Submission Orchestrator
//!
//! A `VotingSession` is one voter looking at one show's setlist. It owns the
//! vote count cache, the quota tracker, the set of slots this voter has
//! voted for, and optionally a realtime feed that keeps the cache current.
//!
//! `vote()` checks preconditions and applies the optimistic mutations under
//! one lock, then performs the ledger write on a spawned task that always
//! reconciles, even if the caller stops waiting.

use crate::cache::VoteCountCache;
use crate::error::VoteError;
use crate::feed::{
    self, ActivityHandler, ConnectionState, FeedConfig, FeedConnector, FeedHandle, ResyncHandler,
    Subscription,
};
use crate::identity::VoterIdentity;
use crate::ledger::VoteLedger;
use crate::quota::QuotaTracker;
use encore_common::{QuotaUsage, VoteReceipt};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
struct VoterState {
    quota: QuotaTracker,
    /// Confirmed and in-flight votes
    voted: HashSet<Uuid>,
}

type SharedState = Arc<Mutex<VoterState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, VoterState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct VotingSession {
    ledger: Arc<dyn VoteLedger>,
    identity: Option<VoterIdentity>,
    show_id: Uuid,
    setlist_id: Uuid,
    cache: Arc<VoteCountCache>,
    state: SharedState,
    feed: Mutex<Option<FeedHandle>>,
    feed_config: FeedConfig,
}

impl VotingSession {
    /// Load quota, voted slots and counts for `show_id`/`setlist_id`
    ///
    /// Every read fails soft: the session opens with zero usage or an empty
    /// cache and logs a warning.
    pub async fn open(
        ledger: Arc<dyn VoteLedger>,
        identity: Option<VoterIdentity>,
        show_id: Uuid,
        setlist_id: Uuid,
    ) -> Self {
        let (quota, voted_slots) = QuotaTracker::load(ledger.as_ref(), identity.as_ref(), show_id).await;

        let cache = Arc::new(VoteCountCache::new());
        match ledger.vote_counts(setlist_id).await {
            Ok(counts) => cache.seed(&counts.counts),
            Err(e) => warn!(%setlist_id, error = %e, "Failed to load vote counts, starting empty"),
        }

        info!(
            %show_id,
            %setlist_id,
            user_id = identity.as_ref().map(|i| i.user_id.as_str()).unwrap_or("-"),
            slots = cache.len(),
            show_used = quota.usage().show_used,
            "Voting session opened"
        );

        Self {
            ledger,
            identity,
            show_id,
            setlist_id,
            cache,
            state: Arc::new(Mutex::new(VoterState {
                quota,
                voted: voted_slots.into_iter().collect(),
            })),
            feed: Mutex::new(None),
            feed_config: FeedConfig::default(),
        }
    }

    pub fn with_feed_config(mut self, config: FeedConfig) -> Self {
        self.feed_config = config;
        self
    }

    pub fn show_id(&self) -> Uuid {
        self.show_id
    }

    pub fn setlist_id(&self) -> Uuid {
        self.setlist_id
    }

    pub fn identity(&self) -> Option<&VoterIdentity> {
        self.identity.as_ref()
    }

    /// Cast one vote for `song_slot_id`
    ///
    /// Preconditions, first failure wins and nothing is mutated:
    /// identified voter, not already voted for the slot, quota available.
    /// The cache, quota and voted set are updated optimistically before the
    /// ledger write and rolled back if it fails.
    pub async fn vote(&self, song_slot_id: Uuid) -> Result<VoteReceipt, VoteError> {
        let voter = self
            .identity
            .clone()
            .filter(VoterIdentity::is_identified)
            .ok_or(VoteError::Unauthenticated)?;

        {
            let mut state = lock(&self.state);
            if state.voted.contains(&song_slot_id) {
                debug!(%song_slot_id, "Already voted, rejected locally");
                return Err(VoteError::AlreadyVoted);
            }
            state.quota.reserve()?;
            state.voted.insert(song_slot_id);
            self.cache.apply_optimistic(song_slot_id, 1);
        }

        let submission = tokio::spawn(submit_and_reconcile(
            Arc::clone(&self.ledger),
            voter,
            song_slot_id,
            Arc::clone(&self.cache),
            Arc::clone(&self.state),
        ));

        match submission.await {
            Ok(result) => result,
            Err(e) => {
                // The task died before reconciling
                warn!(%song_slot_id, "Vote task failed: {}", e);
                roll_back_vote(&self.cache, &self.state, song_slot_id);
                Err(VoteError::SubmissionFailed(e.to_string()))
            }
        }
    }

    pub fn get_vote_count(&self, song_slot_id: Uuid) -> i64 {
        self.cache.get(song_slot_id)
    }

    pub fn vote_counts(&self) -> HashMap<Uuid, i64> {
        self.cache.snapshot()
    }

    pub fn has_user_voted(&self, song_slot_id: Uuid) -> bool {
        lock(&self.state).voted.contains(&song_slot_id)
    }

    pub fn quota(&self) -> QuotaUsage {
        lock(&self.state).quota.usage()
    }

    pub fn is_quota_exhausted(&self) -> bool {
        lock(&self.state).quota.is_exhausted()
    }

    // ========================================
    // Realtime feed
    // ========================================

    /// Subscribe the cache to the setlist's realtime feed
    ///
    /// Replaces any feed already attached. After the feed recovers from a
    /// drop or a lag the cache is reloaded from the ledger.
    pub fn attach_feed(&self, connector: Arc<dyn FeedConnector>, on_activity: Option<ActivityHandler>) {
        let cache = Arc::clone(&self.cache);
        let on_resync: ResyncHandler = {
            let ledger = Arc::clone(&self.ledger);
            let cache = Arc::clone(&self.cache);
            let setlist_id = self.setlist_id;
            Arc::new(move || {
                tokio::spawn(reload_counts(Arc::clone(&ledger), Arc::clone(&cache), setlist_id));
            })
        };
        let subscription = Subscription {
            setlist_id: self.setlist_id,
            own_user_id: self.identity.as_ref().map(|i| i.user_id.clone()),
            on_update: Arc::new(move |song_slot_id, count| cache.apply_remote(song_slot_id, count)),
            on_activity,
            on_resync: Some(on_resync),
        };

        let handle = feed::subscribe(connector, subscription, self.feed_config);
        let previous = self
            .feed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.unsubscribe();
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.feed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(ConnectionState::Disconnected, FeedHandle::state)
    }

    pub fn watch_state(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.feed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(FeedHandle::watch_state)
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Subscribed
    }

    pub fn reconnect(&self) {
        if let Some(feed) = self.feed.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            feed.reconnect();
        }
    }

    /// Tear down the feed. Idempotent.
    pub fn close(&self) {
        let feed = self.feed.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(feed) = feed {
            feed.unsubscribe();
            info!(setlist_id = %self.setlist_id, "Voting session closed");
        }
    }
}

impl Drop for VotingSession {
    fn drop(&mut self) {
        self.close();
    }
}

async fn submit_and_reconcile(
    ledger: Arc<dyn VoteLedger>,
    voter: VoterIdentity,
    song_slot_id: Uuid,
    cache: Arc<VoteCountCache>,
    state: SharedState,
) -> Result<VoteReceipt, VoteError> {
    match ledger.submit_vote(&voter, song_slot_id).await {
        Ok(receipt) => {
            lock(&state).quota.commit(receipt.usage);
            cache.confirm(song_slot_id, receipt.new_count);
            info!(
                user_id = %voter.user_id,
                %song_slot_id,
                new_count = receipt.new_count,
                show_used = receipt.usage.show_used,
                "Vote confirmed"
            );
            Ok(receipt)
        }
        Err(e) => {
            roll_back_vote(&cache, &state, song_slot_id);

            let err = VoteError::from(e);
            match err {
                VoteError::AlreadyVoted => info!(%song_slot_id, "Ledger reports vote already recorded"),
                _ => warn!(%song_slot_id, error = %err, "Vote rolled back"),
            }
            Err(err)
        }
    }
}

/// Undo the optimistic mutations of one vote
fn roll_back_vote(cache: &VoteCountCache, state: &SharedState, song_slot_id: Uuid) {
    {
        let mut state = lock(state);
        state.quota.rollback();
        state.voted.remove(&song_slot_id);
    }
    cache.revert(song_slot_id, 1);
}

/// Replace cached counts with a fresh ledger snapshot
async fn reload_counts(ledger: Arc<dyn VoteLedger>, cache: Arc<VoteCountCache>, setlist_id: Uuid) {
    match ledger.vote_counts(setlist_id).await {
        Ok(counts) => {
            for (song_slot_id, count) in counts.counts {
                cache.apply_remote(song_slot_id, count);
            }
            debug!(%setlist_id, slots = cache.len(), "Vote counts reloaded after feed gap");
        }
        Err(e) => warn!(%setlist_id, error = %e, "Failed to reload vote counts"),
    }
}
