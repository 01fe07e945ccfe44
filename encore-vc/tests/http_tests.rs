//! End-to-end tests against a live encore-ls
//!
//! Starts the ledger service on an ephemeral port and drives it through
//! `HttpLedger` and the SSE connector.

use chrono::NaiveDate;
use encore_common::db::{NewSong, Setlist};
use encore_common::events::EventBus;
use encore_common::votes::VoteRejection;
use encore_ls::{build_router, AppState};
use encore_vc::feed::VoteActivity;
use encore_vc::{
    HttpLedger, LedgerError, VoteError, VoteLedger, VoterIdentity, VotingSession,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Serve a fresh ledger on 127.0.0.1, returning its base URL and a seeded setlist
async fn start_server(songs: usize) -> (String, Setlist) {
    let pool = encore_common::db::init_memory_database()
        .await
        .expect("Should create in-memory database");
    let state = AppState::new(pool, EventBus::new(100));

    let show = state
        .ledger
        .create_show("Japanese Breakfast", "The Fillmore", NaiveDate::from_ymd_opt(2026, 10, 30).unwrap())
        .await
        .unwrap();
    let songs: Vec<NewSong> = (1..=songs).map(|i| NewSong::named(format!("Track {}", i))).collect();
    let setlist = state.ledger.create_setlist(show.id, &songs).await.unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });

    (format!("http://{}", addr), setlist)
}

fn voter(id: &str, name: &str) -> VoterIdentity {
    VoterIdentity::authenticated(id, Some(name.to_string()))
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_http_ledger_round_trip() {
    let (url, setlist) = start_server(2).await;
    let slot = setlist.slots[0].id;
    let ledger = HttpLedger::new(url).unwrap();
    let me = voter("user-1", "Michelle");

    let receipt = ledger.submit_vote(&me, slot).await.unwrap();
    assert_eq!(receipt.new_count, 1);
    assert_eq!(receipt.usage.show_used, 1);

    let counts = ledger.vote_counts(setlist.id).await.unwrap();
    assert_eq!(counts.counts[&slot], 1);
    assert_eq!(counts.counts[&setlist.slots[1].id], 0);

    let state = ledger.user_vote_state(&me, setlist.show_id).await.unwrap();
    assert_eq!(state.voted_slots, vec![slot]);
    assert_eq!(state.usage.daily_used, 1);
}

#[tokio::test]
async fn test_http_rejections_are_structured() {
    let (url, setlist) = start_server(1).await;
    let slot = setlist.slots[0].id;
    let ledger = HttpLedger::new(url).unwrap();
    let me = voter("user-1", "Michelle");

    ledger.submit_vote(&me, slot).await.unwrap();
    let duplicate = ledger.submit_vote(&me, slot).await.unwrap_err();
    assert!(matches!(duplicate, LedgerError::Rejected(VoteRejection::AlreadyVoted)));

    let missing = ledger.submit_vote(&me, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(missing, LedgerError::NotFound(_)));

    let anonymous = VoterIdentity::authenticated("", None);
    let refused = ledger.submit_vote(&anonymous, slot).await.unwrap_err();
    assert!(matches!(refused, LedgerError::Unauthenticated));
}

#[tokio::test]
async fn test_session_over_http_with_live_feed() {
    let (url, setlist) = start_server(2).await;
    let slot = setlist.slots[1].id;
    let ledger = HttpLedger::new(url).unwrap();

    let session = VotingSession::open(
        Arc::new(ledger.clone()),
        Some(voter("user-1", "Michelle")),
        setlist.show_id,
        setlist.id,
    )
    .await;
    let activity = Arc::new(Mutex::new(Vec::<String>::new()));
    let seen = Arc::clone(&activity);
    session.attach_feed(
        Arc::new(ledger.feed_connector()),
        Some(Arc::new(move |a: &VoteActivity| {
            seen.lock().unwrap().push(format!("{} -> {}", a.voter_name, a.song_name))
        })),
    );
    wait_until(|| session.is_connected()).await;

    session.vote(slot).await.unwrap();
    assert_eq!(session.get_vote_count(slot), 1);
    assert_eq!(session.vote(slot).await, Err(VoteError::AlreadyVoted));

    // Another fan votes through their own client
    ledger.submit_vote(&voter("user-2", "Peter"), slot).await.unwrap();

    wait_until(|| session.get_vote_count(slot) == 2).await;
    wait_until(|| !activity.lock().unwrap().is_empty()).await;
    assert_eq!(*activity.lock().unwrap(), vec!["Peter -> Track 2".to_string()]);

    session.close();
    assert!(!session.is_connected());
}
