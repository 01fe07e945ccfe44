//! Authoritative vote ledger
//!
//! Owns the one-vote-per-user-per-song rows and the denormalized per-slot
//! counters. Every successful write is published on the [`EventBus`] after
//! its transaction commits, which is what drives the realtime feed.

use crate::db::models::{NewSong, Setlist, Show, SongSlot};
use crate::events::{EventBus, VoteEvent};
use crate::votes::{QuotaUsage, UserVoteState, VoteCounts, VoteReceipt, VoteRejection};
use crate::votes::{DAILY_VOTE_LIMIT, SHOW_VOTE_LIMIT};
use crate::{time, Error, Result};
use chrono::NaiveDate;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Display name given to voters who never supplied one
pub const DEFAULT_DISPLAY_NAME: &str = "A fan";

type SlotRow = (String, String, i64, i64, String, String, Option<String>, Option<String>);

const SLOT_COLUMNS: &str = r#"
    ss.id, ss.setlist_id, ss.position, ss.vote_count,
    s.id, s.name, s.album, s.external_url
"#;

fn parse_guid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Corrupt id {:?}: {}", value, e)))
}

fn slot_from_row(row: SlotRow) -> Result<SongSlot> {
    Ok(SongSlot {
        id: parse_guid(&row.0)?,
        setlist_id: parse_guid(&row.1)?,
        position: row.2,
        vote_count: row.3,
        song_id: parse_guid(&row.4)?,
        song_name: row.5,
        album: row.6,
        external_url: row.7,
    })
}

/// SQLite-backed vote ledger
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
    events: EventBus,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool, events: EventBus) -> Self {
        Self { pool, events }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bus on which committed changes are published
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ========================================
    // Shows and setlists
    // ========================================

    pub async fn create_show(&self, artist: &str, venue: &str, show_date: NaiveDate) -> Result<Show> {
        if artist.trim().is_empty() {
            return Err(Error::InvalidInput("artist must not be empty".to_string()));
        }

        let show = Show {
            id: Uuid::new_v4(),
            artist: artist.to_string(),
            venue: venue.to_string(),
            show_date,
        };

        sqlx::query("INSERT INTO shows (id, artist, venue, show_date) VALUES (?, ?, ?, ?)")
            .bind(show.id.to_string())
            .bind(&show.artist)
            .bind(&show.venue)
            .bind(show.show_date.to_string())
            .execute(&self.pool)
            .await?;

        info!(show_id = %show.id, artist = %show.artist, "Created show");
        Ok(show)
    }

    pub async fn get_show(&self, show_id: Uuid) -> Result<Show> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT artist, venue, show_date FROM shows WHERE id = ?")
                .bind(show_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        let (artist, venue, show_date) =
            row.ok_or_else(|| Error::NotFound(format!("show {}", show_id)))?;
        let show_date = NaiveDate::parse_from_str(&show_date, "%Y-%m-%d")
            .map_err(|e| Error::Internal(format!("Corrupt show date {:?}: {}", show_date, e)))?;

        Ok(Show {
            id: show_id,
            artist,
            venue,
            show_date,
        })
    }

    /// Initialize the setlist of a show with songs at positions 1..=n
    pub async fn create_setlist(&self, show_id: Uuid, songs: &[NewSong]) -> Result<Setlist> {
        self.get_show(show_id).await?;

        let mut tx = self.pool.begin().await?;

        let existing: Option<String> = sqlx::query_scalar("SELECT id FROM setlists WHERE show_id = ?")
            .bind(show_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(Error::InvalidInput(format!("show {} already has a setlist", show_id)));
        }

        let setlist_id = Uuid::new_v4();
        sqlx::query("INSERT INTO setlists (id, show_id) VALUES (?, ?)")
            .bind(setlist_id.to_string())
            .bind(show_id.to_string())
            .execute(&mut *tx)
            .await?;

        for (index, song) in songs.iter().enumerate() {
            insert_slot(&mut tx, setlist_id, index as i64 + 1, song).await?;
        }

        tx.commit().await?;

        info!(%show_id, %setlist_id, songs = songs.len(), "Initialized setlist");
        self.get_setlist(setlist_id).await
    }

    pub async fn get_setlist(&self, setlist_id: Uuid) -> Result<Setlist> {
        let show_id: Option<String> = sqlx::query_scalar("SELECT show_id FROM setlists WHERE id = ?")
            .bind(setlist_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        let show_id = show_id.ok_or_else(|| Error::NotFound(format!("setlist {}", setlist_id)))?;

        let rows: Vec<SlotRow> = sqlx::query_as(&format!(
            "SELECT {} FROM setlist_songs ss JOIN songs s ON s.id = ss.song_id \
             WHERE ss.setlist_id = ? ORDER BY ss.position",
            SLOT_COLUMNS
        ))
        .bind(setlist_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(Setlist {
            id: setlist_id,
            show_id: parse_guid(&show_id)?,
            slots: rows.into_iter().map(slot_from_row).collect::<Result<_>>()?,
        })
    }

    /// Setlist of a show, if one has been initialized
    pub async fn setlist_for_show(&self, show_id: Uuid) -> Result<Option<Setlist>> {
        let setlist_id: Option<String> = sqlx::query_scalar("SELECT id FROM setlists WHERE show_id = ?")
            .bind(show_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match setlist_id {
            Some(id) => Ok(Some(self.get_setlist(parse_guid(&id)?).await?)),
            None => Ok(None),
        }
    }

    /// Append a fan-suggested song at the next free position
    pub async fn suggest_song(&self, setlist_id: Uuid, song: &NewSong) -> Result<SongSlot> {
        if song.name.trim().is_empty() {
            return Err(Error::InvalidInput("song name must not be empty".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM setlists WHERE id = ?)")
            .bind(setlist_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(Error::NotFound(format!("setlist {}", setlist_id)));
        }

        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM setlist_songs WHERE setlist_id = ?",
        )
        .bind(setlist_id.to_string())
        .fetch_one(&mut *tx)
        .await?;

        let slot = insert_slot(&mut tx, setlist_id, position, song).await?;
        tx.commit().await?;

        info!(%setlist_id, slot_id = %slot.id, position, song = %slot.song_name, "Song suggested");
        self.events.emit_lossy(VoteEvent::SongSuggested {
            setlist_id,
            song_slot_id: slot.id,
            position,
            song_name: slot.song_name.clone(),
            timestamp: time::now(),
        });

        Ok(slot)
    }

    // ========================================
    // Votes
    // ========================================

    /// Current counts of every slot of a setlist
    pub async fn vote_counts(&self, setlist_id: Uuid) -> Result<VoteCounts> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM setlists WHERE id = ?)")
            .bind(setlist_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(Error::NotFound(format!("setlist {}", setlist_id)));
        }

        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT id, vote_count FROM setlist_songs WHERE setlist_id = ?")
                .bind(setlist_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for (id, count) in rows {
            counts.insert(parse_guid(&id)?, count);
        }

        Ok(VoteCounts { setlist_id, counts })
    }

    /// A user's voted slots and quota usage for one show
    pub async fn user_vote_state(&self, user_id: &str, show_id: Uuid) -> Result<UserVoteState> {
        let voted: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT v.setlist_song_id FROM votes v
            JOIN setlist_songs ss ON ss.id = v.setlist_song_id
            JOIN setlists sl ON sl.id = ss.setlist_id
            WHERE v.user_id = ? AND sl.show_id = ?
            "#,
        )
        .bind(user_id)
        .bind(show_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let daily_used = count_daily_votes(&self.pool, user_id).await?;

        Ok(UserVoteState {
            user_id: user_id.to_string(),
            show_id,
            usage: QuotaUsage::from_counts(daily_used, voted.len() as u32),
            voted_slots: voted.iter().map(|id| parse_guid(id)).collect::<Result<_>>()?,
        })
    }

    /// Insert one vote and increment the slot counter atomically
    ///
    /// Rejections come back as [`Error::Rejected`], checked in order:
    /// unknown slot, duplicate vote, show limit, daily limit. The vote row is
    /// written before the quota counts are taken, so the transaction holds
    /// SQLite's write lock for the whole check-and-increment and concurrent
    /// voters cannot lose updates.
    pub async fn submit_vote(
        &self,
        user_id: &str,
        display_name: Option<&str>,
        song_slot_id: Uuid,
    ) -> Result<VoteReceipt> {
        if user_id.trim().is_empty() {
            return Err(Error::InvalidInput("user id must not be empty".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO users (id, display_name) VALUES (?, ?)")
            .bind(user_id)
            .bind(display_name.unwrap_or(DEFAULT_DISPLAY_NAME))
            .execute(&mut *tx)
            .await?;
        if let Some(name) = display_name {
            sqlx::query("UPDATE users SET display_name = ? WHERE id = ?")
                .bind(name)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let slot: Option<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT ss.setlist_id, sl.show_id, s.name FROM setlist_songs ss
            JOIN setlists sl ON sl.id = ss.setlist_id
            JOIN songs s ON s.id = ss.song_id
            WHERE ss.id = ?
            "#,
        )
        .bind(song_slot_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
        let Some((setlist_id, show_id, song_name)) = slot else {
            tx.rollback().await?;
            return Err(Error::Rejected(VoteRejection::NotFound));
        };

        let vote_id = Uuid::new_v4();
        let inserted = sqlx::query(
            "INSERT INTO votes (id, setlist_song_id, user_id, created_at_ms) VALUES (?, ?, ?, ?)",
        )
        .bind(vote_id.to_string())
        .bind(song_slot_id.to_string())
        .bind(user_id)
        .bind(time::now().timestamp_millis())
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tx.rollback().await?;
                debug!(%user_id, %song_slot_id, "Duplicate vote rejected");
                return Err(Error::Rejected(VoteRejection::AlreadyVoted));
            }
            Err(e) => return Err(e.into()),
        }

        // Counts include the row just inserted
        let show_used: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM votes v
            JOIN setlist_songs ss ON ss.id = v.setlist_song_id
            JOIN setlists sl ON sl.id = ss.setlist_id
            WHERE v.user_id = ? AND sl.show_id = ?
            "#,
        )
        .bind(user_id)
        .bind(&show_id)
        .fetch_one(&mut *tx)
        .await?;
        if show_used > SHOW_VOTE_LIMIT as i64 {
            tx.rollback().await?;
            warn!(%user_id, %show_id, "Show vote limit reached");
            return Err(Error::Rejected(VoteRejection::ShowLimitReached));
        }

        let daily_used = count_daily_votes(&mut *tx, user_id).await?;
        if daily_used > DAILY_VOTE_LIMIT {
            tx.rollback().await?;
            warn!(%user_id, "Daily vote limit reached");
            return Err(Error::Rejected(VoteRejection::DailyLimitReached));
        }

        sqlx::query("UPDATE setlist_songs SET vote_count = vote_count + 1 WHERE id = ?")
            .bind(song_slot_id.to_string())
            .execute(&mut *tx)
            .await?;
        let new_count: i64 = sqlx::query_scalar("SELECT vote_count FROM setlist_songs WHERE id = ?")
            .bind(song_slot_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        let voter_name: String = sqlx::query_scalar("SELECT display_name FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        let setlist_id = parse_guid(&setlist_id)?;
        info!(%user_id, %song_slot_id, new_count, "Vote recorded");

        let timestamp = time::now();
        self.events.emit_lossy(VoteEvent::VoteCountChanged {
            setlist_id,
            song_slot_id,
            new_count,
            timestamp,
        });
        self.events.emit_lossy(VoteEvent::VoteCast {
            setlist_id,
            song_slot_id,
            user_id: user_id.to_string(),
            song_name,
            voter_name,
            timestamp,
        });

        Ok(VoteReceipt {
            vote_id,
            song_slot_id,
            setlist_id,
            new_count,
            usage: QuotaUsage::from_counts(daily_used, show_used as u32),
        })
    }
}

async fn insert_slot(
    tx: &mut Transaction<'_, Sqlite>,
    setlist_id: Uuid,
    position: i64,
    song: &NewSong,
) -> Result<SongSlot> {
    let song_id = Uuid::new_v4();
    sqlx::query("INSERT INTO songs (id, name, album, external_url) VALUES (?, ?, ?, ?)")
        .bind(song_id.to_string())
        .bind(&song.name)
        .bind(&song.album)
        .bind(&song.external_url)
        .execute(&mut **tx)
        .await?;

    let slot_id = Uuid::new_v4();
    sqlx::query("INSERT INTO setlist_songs (id, setlist_id, song_id, position) VALUES (?, ?, ?, ?)")
        .bind(slot_id.to_string())
        .bind(setlist_id.to_string())
        .bind(song_id.to_string())
        .bind(position)
        .execute(&mut **tx)
        .await?;

    Ok(SongSlot {
        id: slot_id,
        setlist_id,
        position,
        vote_count: 0,
        song_id,
        song_name: song.name.clone(),
        album: song.album.clone(),
        external_url: song.external_url.clone(),
    })
}

/// Votes cast by a user since the start of the current UTC day
async fn count_daily_votes<'e, E>(executor: E, user_id: &str) -> Result<u32>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let since = time::start_of_utc_day(time::now()).timestamp_millis();
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE user_id = ? AND created_at_ms >= ?")
            .bind(user_id)
            .bind(since)
            .fetch_one(executor)
            .await?;
    Ok(count as u32)
}
