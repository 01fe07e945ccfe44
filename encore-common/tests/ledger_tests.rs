//! Tests for the SQLite vote ledger
//!
//! Covers setlist lifecycle (initialization, suggestions), atomic vote
//! submission, the uniqueness constraint, quota enforcement and the events
//! published after each commit.

use chrono::NaiveDate;
use encore_common::db::{init_memory_database, NewSong, Setlist, SqliteLedger};
use encore_common::events::{EventBus, VoteEvent};
use encore_common::{Error, VoteRejection, SHOW_VOTE_LIMIT};
use uuid::Uuid;

async fn setup_ledger() -> SqliteLedger {
    let pool = init_memory_database().await.expect("in-memory database");
    SqliteLedger::new(pool, EventBus::new(100))
}

async fn setup_setlist(ledger: &SqliteLedger, songs: usize) -> Setlist {
    let show = ledger
        .create_show(
            "Radiohead",
            "Madison Square Garden",
            NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
        )
        .await
        .unwrap();
    let songs: Vec<NewSong> = (1..=songs).map(|i| NewSong::named(format!("Song {}", i))).collect();
    ledger.create_setlist(show.id, &songs).await.unwrap()
}

#[tokio::test]
async fn test_setlist_positions_are_contiguous() {
    let ledger = setup_ledger().await;
    let setlist = setup_setlist(&ledger, 3).await;

    let positions: Vec<i64> = setlist.slots.iter().map(|s| s.position).collect();
    assert_eq!(positions, vec![1, 2, 3]);
    assert!(setlist.slots.iter().all(|s| s.vote_count == 0));

    let fetched = ledger.setlist_for_show(setlist.show_id).await.unwrap();
    assert_eq!(fetched, Some(setlist));
}

#[tokio::test]
async fn test_second_setlist_for_show_refused() {
    let ledger = setup_ledger().await;
    let setlist = setup_setlist(&ledger, 1).await;

    let result = ledger.create_setlist(setlist.show_id, &[NewSong::named("Encore")]).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_suggest_song_appends_and_publishes() {
    let ledger = setup_ledger().await;
    let setlist = setup_setlist(&ledger, 2).await;
    let mut rx = ledger.events().subscribe();

    let slot = ledger
        .suggest_song(setlist.id, &NewSong::named("Creep"))
        .await
        .unwrap();

    assert_eq!(slot.position, 3);
    assert_eq!(slot.vote_count, 0);

    match rx.recv().await.unwrap() {
        VoteEvent::SongSuggested { song_slot_id, position, song_name, .. } => {
            assert_eq!(song_slot_id, slot.id);
            assert_eq!(position, 3);
            assert_eq!(song_name, "Creep");
        }
        other => panic!("unexpected event {:?}", other),
    }

    let missing = ledger.suggest_song(Uuid::new_v4(), &NewSong::named("Creep")).await;
    assert!(matches!(missing, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_vote_increments_counter_and_publishes() {
    let ledger = setup_ledger().await;
    let setlist = setup_setlist(&ledger, 2).await;
    let slot = &setlist.slots[0];
    let mut rx = ledger.events().subscribe();

    let receipt = ledger.submit_vote("user-1", Some("Sam"), slot.id).await.unwrap();

    assert_eq!(receipt.new_count, 1);
    assert_eq!(receipt.setlist_id, setlist.id);
    assert_eq!(receipt.usage.show_used, 1);
    assert_eq!(receipt.usage.daily_used, 1);
    assert_eq!(receipt.usage.show_remaining, SHOW_VOTE_LIMIT - 1);

    let counts = ledger.vote_counts(setlist.id).await.unwrap();
    assert_eq!(counts.counts[&slot.id], 1);
    assert_eq!(counts.counts[&setlist.slots[1].id], 0);

    match rx.recv().await.unwrap() {
        VoteEvent::VoteCountChanged { song_slot_id, new_count, .. } => {
            assert_eq!(song_slot_id, slot.id);
            assert_eq!(new_count, 1);
        }
        other => panic!("unexpected event {:?}", other),
    }
    match rx.recv().await.unwrap() {
        VoteEvent::VoteCast { user_id, voter_name, song_name, .. } => {
            assert_eq!(user_id, "user-1");
            assert_eq!(voter_name, "Sam");
            assert_eq!(song_name, "Song 1");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_duplicate_vote_rejected_without_increment() {
    let ledger = setup_ledger().await;
    let setlist = setup_setlist(&ledger, 1).await;
    let slot_id = setlist.slots[0].id;

    ledger.submit_vote("user-1", None, slot_id).await.unwrap();
    let second = ledger.submit_vote("user-1", None, slot_id).await;

    assert!(matches!(second, Err(Error::Rejected(VoteRejection::AlreadyVoted))));
    let counts = ledger.vote_counts(setlist.id).await.unwrap();
    assert_eq!(counts.counts[&slot_id], 1);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes")
        .fetch_one(ledger.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_concurrent_duplicate_votes_insert_once() {
    let dir = tempfile::tempdir().unwrap();
    let pool = encore_common::db::init_database(&dir.path().join("encore.db")).await.unwrap();
    let ledger = SqliteLedger::new(pool, EventBus::new(100));
    let setlist = setup_setlist(&ledger, 1).await;
    let slot_id = setlist.slots[0].id;

    let attempts: Vec<_> = (0..5)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.submit_vote("user-1", None, slot_id).await })
        })
        .collect();

    let mut accepted = 0;
    for attempt in attempts {
        if attempt.await.unwrap().is_ok() {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 1);
    let counts = ledger.vote_counts(setlist.id).await.unwrap();
    assert_eq!(counts.counts[&slot_id], 1);
}

#[tokio::test]
async fn test_show_limit_enforced_server_side() {
    let ledger = setup_ledger().await;
    let setlist = setup_setlist(&ledger, SHOW_VOTE_LIMIT as usize + 1).await;

    for slot in &setlist.slots[..SHOW_VOTE_LIMIT as usize] {
        ledger.submit_vote("user-1", None, slot.id).await.unwrap();
    }

    let over = setlist.slots.last().unwrap();
    let result = ledger.submit_vote("user-1", None, over.id).await;
    assert!(matches!(result, Err(Error::Rejected(VoteRejection::ShowLimitReached))));

    // The refused vote left no trace
    let counts = ledger.vote_counts(setlist.id).await.unwrap();
    assert_eq!(counts.counts[&over.id], 0);
    let state = ledger.user_vote_state("user-1", setlist.show_id).await.unwrap();
    assert_eq!(state.usage.show_used, SHOW_VOTE_LIMIT);
    assert_eq!(state.usage.show_remaining, 0);
    assert_eq!(state.voted_slots.len(), SHOW_VOTE_LIMIT as usize);
}

#[tokio::test]
async fn test_daily_limit_spans_shows() {
    let ledger = setup_ledger().await;

    // Five shows of ten songs: fifty votes, all within the per-show cap
    let mut last_setlist = None;
    for _ in 0..5 {
        let setlist = setup_setlist(&ledger, SHOW_VOTE_LIMIT as usize).await;
        for slot in &setlist.slots {
            ledger.submit_vote("user-1", None, slot.id).await.unwrap();
        }
        last_setlist = Some(setlist);
    }

    let fresh = setup_setlist(&ledger, 1).await;
    let result = ledger.submit_vote("user-1", None, fresh.slots[0].id).await;
    assert!(matches!(result, Err(Error::Rejected(VoteRejection::DailyLimitReached))));

    let state = ledger
        .user_vote_state("user-1", last_setlist.unwrap().show_id)
        .await
        .unwrap();
    assert_eq!(state.usage.daily_remaining, 0);

    // Another user is unaffected
    assert!(ledger.submit_vote("user-2", None, fresh.slots[0].id).await.is_ok());
}

#[tokio::test]
async fn test_unknown_slot_rejected() {
    let ledger = setup_ledger().await;
    let result = ledger.submit_vote("user-1", None, Uuid::new_v4()).await;
    assert!(matches!(result, Err(Error::Rejected(VoteRejection::NotFound))));
}

#[tokio::test]
async fn test_user_vote_state_for_new_user_is_zero() {
    let ledger = setup_ledger().await;
    let setlist = setup_setlist(&ledger, 1).await;

    let state = ledger.user_vote_state("nobody", setlist.show_id).await.unwrap();
    assert!(state.voted_slots.is_empty());
    assert_eq!(state.usage.daily_used, 0);
    assert_eq!(state.usage.show_used, 0);
}
