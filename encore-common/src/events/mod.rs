//! Event types for the Encore event system
//!
//! Provides the shared event definitions and the EventBus the ledger service
//! publishes on. The realtime feed is a per-setlist view of this bus.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Encore event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Every event is scoped to exactly one setlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VoteEvent {
    /// A song slot's vote counter changed
    ///
    /// Triggers:
    /// - Vote Count Cache: replace the cached count
    VoteCountChanged {
        setlist_id: Uuid,
        song_slot_id: Uuid,
        /// Counter value after the change
        new_count: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A vote row was inserted
    ///
    /// Triggers:
    /// - Activity notifications ("someone just voted")
    VoteCast {
        setlist_id: Uuid,
        song_slot_id: Uuid,
        user_id: String,
        /// Name of the song voted for
        song_name: String,
        /// Voter display name
        voter_name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A fan suggested a new song, appended to the setlist
    SongSuggested {
        setlist_id: Uuid,
        song_slot_id: Uuid,
        /// 1-based position of the new slot
        position: i64,
        song_name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl VoteEvent {
    /// Get event type as string for filtering and the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            VoteEvent::VoteCountChanged { .. } => "VoteCountChanged",
            VoteEvent::VoteCast { .. } => "VoteCast",
            VoteEvent::SongSuggested { .. } => "SongSuggested",
        }
    }

    /// Setlist this event belongs to
    pub fn setlist_id(&self) -> Uuid {
        match self {
            VoteEvent::VoteCountChanged { setlist_id, .. }
            | VoteEvent::VoteCast { setlist_id, .. }
            | VoteEvent::SongSuggested { setlist_id, .. } => *setlist_id,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use encore_common::events::{EventBus, VoteEvent};
/// use uuid::Uuid;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(VoteEvent::VoteCountChanged {
///     setlist_id: Uuid::new_v4(),
///     song_slot_id: Uuid::new_v4(),
///     new_count: 1,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VoteEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before lagging receivers
    ///   start losing the oldest ones
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<VoteEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: VoteEvent,
    ) -> Result<usize, broadcast::error::SendError<VoteEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: VoteEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_changed(setlist_id: Uuid, new_count: i64) -> VoteEvent {
        VoteEvent::VoteCountChanged {
            setlist_id,
            song_slot_id: Uuid::new_v4(),
            new_count,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let setlist_id = Uuid::new_v4();
        let event = VoteEvent::VoteCast {
            setlist_id,
            song_slot_id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            song_name: "Fake Plastic Trees".to_string(),
            voter_name: "Sam".to_string(),
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "VoteCast");
        assert_eq!(json["song_name"], "Fake Plastic Trees");

        let decoded: VoteEvent = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(decoded.setlist_id(), setlist_id);
        assert_eq!(decoded.event_type(), "VoteCast");
    }

    #[tokio::test]
    async fn test_event_bus_delivers_to_all_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let setlist_id = Uuid::new_v4();
        let delivered = bus.emit(count_changed(setlist_id, 3)).unwrap();
        assert_eq!(delivered, 2);

        assert_eq!(rx1.recv().await.unwrap().setlist_id(), setlist_id);
        assert_eq!(rx2.recv().await.unwrap().setlist_id(), setlist_id);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(count_changed(Uuid::new_v4(), 1)).is_err());
        // Lossy variant never fails
        bus.emit_lossy(count_changed(Uuid::new_v4(), 1));
        assert_eq!(bus.capacity(), 10);
    }
}
