//! Database models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub id: Uuid,
    pub artist: String,
    pub venue: String,
    pub show_date: NaiveDate,
}

/// Song metadata supplied when initializing a setlist or suggesting a song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSong {
    pub name: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
}

impl NewSong {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            album: None,
            external_url: None,
        }
    }
}

/// One song's position within one setlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongSlot {
    pub id: Uuid,
    pub setlist_id: Uuid,
    /// 1-based, contiguous within the setlist
    pub position: i64,
    pub vote_count: i64,
    pub song_id: Uuid,
    pub song_name: String,
    pub album: Option<String>,
    pub external_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setlist {
    pub id: Uuid,
    pub show_id: Uuid,
    /// Ordered by position
    pub slots: Vec<SongSlot>,
}
