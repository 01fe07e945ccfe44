//! Realtime Feed Adapter
//!
//! Subscribes to one setlist's change events and turns them into count
//! updates and activity notifications. Connection lifecycle:
//!
//! ```text
//! Disconnected -> Connecting -> Subscribed
//!                    ^   |          |
//!                    |   v          v
//!                    +-- Error <----+
//! ```
//!
//! After a failure the adapter retries with exponential backoff
//! (`base * 2^(attempt-1)`). Once the retry cap is used up it parks in
//! `Disconnected` until [`FeedHandle::reconnect`] or teardown. Feed loss is
//! never fatal to voting.
//!
//! Pushes sent while the feed was down or lagging are not replayed. The
//! subscriber's resync handler runs whenever the feed comes back from such a
//! gap so it can reload a snapshot.

mod connector;
mod sse;

pub use connector::{BusConnector, EventStream, FeedConnector};
pub use sse::SseConnector;

use chrono::{DateTime, Utc};
use encore_common::config::EncoreConfig;
use crate::error::FeedError;
use encore_common::events::VoteEvent;
use futures::{FutureExt, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Subscribed => "subscribed",
            ConnectionState::Error => "error",
        };
        f.write_str(name)
    }
}

/// "Someone just voted" notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteActivity {
    pub setlist_id: Uuid,
    pub song_slot_id: Uuid,
    pub song_name: String,
    pub voter_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Called with `(song_slot_id, new_count)` for every count change
pub type UpdateHandler = Arc<dyn Fn(Uuid, i64) + Send + Sync>;

/// Called for every vote cast by someone other than the subscriber
pub type ActivityHandler = Arc<dyn Fn(&VoteActivity) + Send + Sync>;

/// Called after events may have been missed (resubscribe after a drop, or lag)
pub type ResyncHandler = Arc<dyn Fn() + Send + Sync>;

/// Retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedConfig {
    pub retry_base: Duration,
    pub max_retries: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            retry_base: Duration::from_millis(1000),
            max_retries: 3,
        }
    }
}

impl From<&EncoreConfig> for FeedConfig {
    fn from(config: &EncoreConfig) -> Self {
        Self {
            retry_base: encore_common::time::millis_to_duration(config.feed_retry_base_ms),
            max_retries: config.feed_max_retries,
        }
    }
}

/// Delay before retry number `attempt` (1-based)
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
}

/// What to subscribe to and who to tell
pub struct Subscription {
    pub setlist_id: Uuid,
    /// Activity from this user is not reported
    pub own_user_id: Option<String>,
    pub on_update: UpdateHandler,
    pub on_activity: Option<ActivityHandler>,
    pub on_resync: Option<ResyncHandler>,
}

/// Open the per-setlist feed on a background task
pub fn subscribe(
    connector: Arc<dyn FeedConnector>,
    subscription: Subscription,
    config: FeedConfig,
) -> FeedHandle {
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
    let state_tx = Arc::new(state_tx);
    let cancel = CancellationToken::new();
    let reconnect = Arc::new(Notify::new());
    let gate = Arc::new(Mutex::new(true));

    let worker = FeedWorker {
        connector,
        subscription,
        config,
        state_tx: Arc::clone(&state_tx),
        cancel: cancel.clone(),
        reconnect: Arc::clone(&reconnect),
        gate: Arc::clone(&gate),
    };
    let task = tokio::spawn(worker.run());

    FeedHandle {
        state_tx,
        state_rx,
        cancel,
        reconnect,
        gate,
        task: Mutex::new(Some(task)),
    }
}

/// Cancellable handle on a running feed
///
/// Dropping the handle tears the feed down.
pub struct FeedHandle {
    state_tx: Arc<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    reconnect: Arc<Notify>,
    gate: Arc<Mutex<bool>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FeedHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Subscribed
    }

    /// Reset the attempt counter and resubscribe immediately
    pub fn reconnect(&self) {
        if !self.cancel.is_cancelled() {
            info!("Feed reconnect requested");
            self.reconnect.notify_one();
        }
    }

    /// Stop the feed. Idempotent; no handler runs once this returns.
    ///
    /// Must not be called from inside a feed handler.
    pub fn unsubscribe(&self) {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = false;
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.state_tx.send_replace(ConnectionState::Disconnected);
        if let Some(task) = self.task.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
        debug!("Feed unsubscribed");
    }

    /// Wait until the feed reaches `target`
    pub async fn wait_for(&self, target: ConnectionState) {
        let mut rx = self.watch_state();
        // Err only if the sender is gone, in which case the state is final
        let _ = rx.wait_for(|state| *state == target).await;
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

struct FeedWorker {
    connector: Arc<dyn FeedConnector>,
    subscription: Subscription,
    config: FeedConfig,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
    reconnect: Arc<Notify>,
    gate: Arc<Mutex<bool>>,
}

enum StreamEnd {
    Cancelled,
    Reconnect,
    Dropped,
}

impl FeedWorker {
    fn set_state(&self, state: ConnectionState) {
        if !self.cancel.is_cancelled() {
            self.state_tx.send_replace(state);
        }
    }

    async fn run(self) {
        let setlist_id = self.subscription.setlist_id;
        let mut attempt: u32 = 0;
        // Set once a subscription has ended or a connect failed
        let mut gap = false;

        loop {
            self.set_state(ConnectionState::Connecting);

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.connector.connect(setlist_id) => result,
            };

            match connected {
                Ok(stream) => {
                    attempt = 0;
                    // A reconnect requested while connecting is satisfied by this connect
                    let _ = self.reconnect.notified().now_or_never();
                    self.set_state(ConnectionState::Subscribed);
                    info!(%setlist_id, "Realtime feed subscribed");

                    if gap {
                        self.resync();
                    }
                    gap = true;

                    match self.pump(stream).await {
                        StreamEnd::Cancelled => return,
                        StreamEnd::Reconnect => continue,
                        StreamEnd::Dropped => warn!(%setlist_id, "Realtime feed closed unexpectedly"),
                    }
                }
                Err(e) => {
                    gap = true;
                    warn!(%setlist_id, attempt, error = %e, "Realtime feed connect failed");
                }
            }

            self.set_state(ConnectionState::Error);
            attempt += 1;

            if attempt > self.config.max_retries {
                warn!(
                    %setlist_id,
                    retries = self.config.max_retries,
                    "Realtime feed giving up, waiting for manual reconnect"
                );
                self.set_state(ConnectionState::Disconnected);
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    _ = self.reconnect.notified() => {}
                }
                attempt = 0;
                continue;
            }

            let delay = backoff_delay(self.config.retry_base, attempt);
            debug!(%setlist_id, attempt, delay_ms = delay.as_millis() as u64, "Retrying realtime feed");
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
                _ = self.reconnect.notified() => attempt = 0,
            }
        }
    }

    async fn pump(&self, mut stream: EventStream) -> StreamEnd {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return StreamEnd::Cancelled,
                _ = self.reconnect.notified() => return StreamEnd::Reconnect,
                item = stream.next() => match item {
                    Some(Ok(event)) => self.dispatch(event),
                    Some(Err(FeedError::Lagged(_))) => self.resync(),
                    Some(Err(e)) => {
                        warn!(error = %e, "Realtime feed stream error");
                        return StreamEnd::Dropped;
                    }
                    None => return StreamEnd::Dropped,
                },
            }
        }
    }

    fn resync(&self) {
        let Some(on_resync) = &self.subscription.on_resync else {
            return;
        };
        let open = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if *open {
            debug!(setlist_id = %self.subscription.setlist_id, "Feed resync");
            on_resync();
        }
    }

    fn dispatch(&self, event: VoteEvent) {
        let sub = &self.subscription;
        if event.setlist_id() != sub.setlist_id {
            return;
        }

        // Held across the handler call so unsubscribe() waits out a dispatch in progress
        let open = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if !*open {
            return;
        }

        match event {
            VoteEvent::VoteCountChanged {
                song_slot_id,
                new_count,
                ..
            } => (sub.on_update)(song_slot_id, new_count),
            VoteEvent::SongSuggested { song_slot_id, .. } => (sub.on_update)(song_slot_id, 0),
            VoteEvent::VoteCast {
                setlist_id,
                song_slot_id,
                user_id,
                song_name,
                voter_name,
                timestamp,
            } => {
                if sub.own_user_id.as_deref() == Some(user_id.as_str()) {
                    return;
                }
                if let Some(on_activity) = &sub.on_activity {
                    on_activity(&VoteActivity {
                        setlist_id,
                        song_slot_id,
                        song_name,
                        voter_name,
                        timestamp,
                    });
                }
            }
        }
    }
}
