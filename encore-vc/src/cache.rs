//! Vote Count Cache
//!
//! Client-side, non-authoritative map of song slot to vote count. Seeded
//! from one snapshot read, adjusted optimistically by the local user's votes
//! and overwritten by authoritative values from the realtime feed and from
//! submission responses.
//!
//! Each entry remembers the optimistic delta still waiting for
//! confirmation. An authoritative value discards that delta, so a later
//! revert of a superseded optimistic vote leaves the authoritative value
//! alone.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Entry {
    count: i64,
    /// Optimistic delta not yet confirmed or superseded
    pending: i64,
}

/// Thread-safe vote count cache (shared with the feed task)
#[derive(Debug, Default)]
pub struct VoteCountCache {
    entries: Mutex<HashMap<Uuid, Entry>>,
}

impl VoteCountCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole cache with an authoritative snapshot
    pub fn seed(&self, counts: &HashMap<Uuid, i64>) {
        let mut entries = self.entries();
        entries.clear();
        entries.extend(counts.iter().map(|(slot, count)| {
            (
                *slot,
                Entry {
                    count: (*count).max(0),
                    pending: 0,
                },
            )
        }));
    }

    /// Cached count, 0 for unknown slots
    pub fn get(&self, song_slot_id: Uuid) -> i64 {
        self.entries().get(&song_slot_id).map_or(0, |e| e.count)
    }

    pub fn apply_optimistic(&self, song_slot_id: Uuid, delta: i64) {
        let mut entries = self.entries();
        let entry = entries.entry(song_slot_id).or_default();
        entry.count = (entry.count + delta).max(0);
        entry.pending += delta;
        trace!(%song_slot_id, delta, count = entry.count, "Optimistic adjustment");
    }

    /// Undo an optimistic adjustment that failed to confirm
    ///
    /// No-op when an authoritative value arrived after the adjustment.
    pub fn revert(&self, song_slot_id: Uuid, delta: i64) {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(&song_slot_id) else {
            return;
        };
        if entry.pending == 0 {
            trace!(%song_slot_id, "Revert skipped, superseded by authoritative count");
            return;
        }
        entry.count = (entry.count - delta).max(0);
        entry.pending -= delta;
    }

    /// Overwrite with a pushed authoritative count
    pub fn apply_remote(&self, song_slot_id: Uuid, count: i64) {
        self.entries().insert(
            song_slot_id,
            Entry {
                count: count.max(0),
                pending: 0,
            },
        );
    }

    /// Apply the count returned by a successful submission
    ///
    /// Replaces the entry like [`apply_remote`](Self::apply_remote), except
    /// when a pushed value already superseded the optimistic delta: counters
    /// only grow, so the larger of the two is kept.
    pub fn confirm(&self, song_slot_id: Uuid, count: i64) {
        let mut entries = self.entries();
        let entry = entries.entry(song_slot_id).or_default();
        entry.count = if entry.pending == 0 {
            entry.count.max(count)
        } else {
            count
        }
        .max(0);
        entry.pending = 0;
    }

    pub fn snapshot(&self) -> HashMap<Uuid, i64> {
        self.entries()
            .iter()
            .map(|(slot, entry)| (*slot, entry.count))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
