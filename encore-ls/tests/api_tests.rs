//! Integration tests for encore-ls API endpoints
//!
//! Tests cover:
//! - Health endpoint (no identity required)
//! - Show creation, setlist initialization, song suggestions
//! - Vote counts and per-user vote state
//! - Vote submission and structured rejections

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use encore_common::events::EventBus;
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot` method
use encore_ls::{build_router, AppState};

/// Test helper: app over a fresh in-memory ledger
async fn setup_app() -> axum::Router {
    let db = encore_common::db::init_memory_database()
        .await
        .expect("Should create in-memory database");
    build_router(AppState::new(db, EventBus::new(100)))
}

/// Test helper: request with optional voter identity and JSON body
fn test_request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-encore-user", user).header("x-encore-name", "Sam");
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Create a show with a setlist of `songs` songs, returning (show_id, setlist JSON)
async fn seed_setlist(app: &axum::Router, songs: usize) -> (String, Value) {
    let response = app
        .clone()
        .oneshot(test_request(
            "POST",
            "/api/shows",
            None,
            Some(json!({"artist": "Phoebe Bridgers", "venue": "Red Rocks", "show_date": "2026-11-20"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let show = extract_json(response.into_body()).await;
    let show_id = show["id"].as_str().unwrap().to_string();

    let song_list: Vec<Value> = (1..=songs).map(|i| json!({"name": format!("Song {}", i)})).collect();
    let response = app
        .clone()
        .oneshot(test_request(
            "POST",
            &format!("/api/shows/{}/setlist", show_id),
            None,
            Some(json!({ "songs": song_list })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    (show_id, extract_json(response.into_body()).await)
}

async fn vote(app: &axum::Router, user: Option<&str>, slot_id: &str) -> axum::response::Response {
    app.clone()
        .oneshot(test_request("POST", "/api/votes", user, Some(json!({ "song_slot_id": slot_id }))))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app().await;

    let response = app.oneshot(test_request("GET", "/health", None, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "encore-ls");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_setlist_initialization_and_suggestion() {
    let app = setup_app().await;
    let (_, setlist) = seed_setlist(&app, 2).await;
    let setlist_id = setlist["id"].as_str().unwrap();
    assert_eq!(setlist["slots"].as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(test_request(
            "POST",
            &format!("/api/setlists/{}/songs", setlist_id),
            None,
            Some(json!({"name": "Motion Sickness", "album": "Stranger in the Alps"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let slot = extract_json(response.into_body()).await;
    assert_eq!(slot["position"], 3);

    let response = app
        .clone()
        .oneshot(test_request("GET", &format!("/api/setlists/{}", setlist_id), None, None))
        .await
        .unwrap();
    let fetched = extract_json(response.into_body()).await;
    let slots = fetched["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 3);
    assert_eq!(slots[2]["song_name"], "Motion Sickness");
}

#[tokio::test]
async fn test_vote_requires_identity() {
    let app = setup_app().await;
    let (_, setlist) = seed_setlist(&app, 1).await;
    let slot_id = setlist["slots"][0]["id"].as_str().unwrap();

    let response = vote(&app, None, slot_id).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "unauthenticated");
}

#[tokio::test]
async fn test_vote_then_duplicate() {
    let app = setup_app().await;
    let (show_id, setlist) = seed_setlist(&app, 1).await;
    let setlist_id = setlist["id"].as_str().unwrap();
    let slot_id = setlist["slots"][0]["id"].as_str().unwrap();

    let response = vote(&app, Some("user-1"), slot_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let receipt = extract_json(response.into_body()).await;
    assert_eq!(receipt["new_count"], 1);
    assert_eq!(receipt["show_used"], 1);
    assert_eq!(receipt["show_remaining"], 9);

    let response = vote(&app, Some("user-1"), slot_id).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "already_voted");

    let response = app
        .clone()
        .oneshot(test_request("GET", &format!("/api/setlists/{}/counts", setlist_id), None, None))
        .await
        .unwrap();
    let counts = extract_json(response.into_body()).await;
    assert_eq!(counts["counts"][slot_id], 1);

    let response = app
        .clone()
        .oneshot(test_request("GET", &format!("/api/shows/{}/votes/me", show_id), Some("user-1"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let state = extract_json(response.into_body()).await;
    assert_eq!(state["voted_slots"], json!([slot_id]));
    assert_eq!(state["daily_used"], 1);
}

#[tokio::test]
async fn test_show_limit_returns_429() {
    let app = setup_app().await;
    let (_, setlist) = seed_setlist(&app, 11).await;
    let slots = setlist["slots"].as_array().unwrap();

    for slot in &slots[..10] {
        let response = vote(&app, Some("user-1"), slot["id"].as_str().unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = vote(&app, Some("user-1"), slots[10]["id"].as_str().unwrap()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "show_limit_reached");
}

#[tokio::test]
async fn test_unknown_resources_return_404() {
    let app = setup_app().await;
    let missing = uuid::Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(test_request("GET", &format!("/api/setlists/{}/counts", missing), None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = vote(&app, Some("user-1"), &missing.to_string()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "not_found");
}
