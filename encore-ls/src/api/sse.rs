//! Server-Sent Events (SSE) realtime feed
//!
//! Streams the ledger's committed changes for one setlist to connected
//! clients.

use crate::AppState;
use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// GET /api/setlists/:setlist_id/events - SSE event stream
///
/// Streams events:
/// - VoteCountChanged
/// - VoteCast
/// - SongSuggested
pub async fn event_stream(
    State(state): State<AppState>,
    Path(setlist_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(%setlist_id, "New SSE client connected");

    let rx = state.ledger.events().subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.setlist_id() == setlist_id => {
                match encore_common::sse::encode_event(&event) {
                    Ok(frame) => {
                        debug!("Broadcasting SSE event: {}", event.event_type());
                        Some(Ok(frame))
                    }
                    Err(e) => {
                        warn!("Failed to serialize event: {}", e);
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(e) => {
                // Lagged receiver: the client keeps its last-known counts
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(encore_common::sse::keep_alive())
}
