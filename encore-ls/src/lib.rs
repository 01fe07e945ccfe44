//! encore-ls library - Ledger Service
//!
//! HTTP front of the authoritative vote ledger: vote counts, per-user vote
//! state, atomic vote submission, setlist lifecycle, and the per-setlist
//! realtime SSE feed.

use axum::Router;
use encore_common::db::SqliteLedger;
use encore_common::events::EventBus;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Authoritative ledger (owns the pool and the event bus)
    pub ledger: SqliteLedger,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, events: EventBus) -> Self {
        Self {
            ledger: SqliteLedger::new(db, events),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let api = Router::new()
        .route("/api/shows", post(api::create_show))
        .route("/api/shows/:show_id", get(api::get_show))
        .route("/api/shows/:show_id/setlist", post(api::create_setlist))
        .route("/api/shows/:show_id/votes/me", get(api::get_my_votes))
        .route("/api/setlists/:setlist_id", get(api::get_setlist))
        .route("/api/setlists/:setlist_id/songs", post(api::suggest_song))
        .route("/api/setlists/:setlist_id/counts", get(api::get_vote_counts))
        .route("/api/setlists/:setlist_id/events", get(api::event_stream))
        .route("/api/votes", post(api::submit_vote));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .route("/build_info", get(api::get_build_info))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
