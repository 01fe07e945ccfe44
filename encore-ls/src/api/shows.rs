//! Show and setlist endpoints
//!
//! Setlist initialization and fan song suggestions. Counts and votes live
//! in the votes module.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use encore_common::db::{NewSong, Setlist, Show, SongSlot};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateShowRequest {
    pub artist: String,
    pub venue: String,
    pub show_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct CreateSetlistRequest {
    pub songs: Vec<NewSong>,
}

/// POST /api/shows
pub async fn create_show(
    State(state): State<AppState>,
    Json(request): Json<CreateShowRequest>,
) -> ApiResult<(StatusCode, Json<Show>)> {
    let show = state
        .ledger
        .create_show(&request.artist, &request.venue, request.show_date)
        .await?;
    Ok((StatusCode::CREATED, Json(show)))
}

/// GET /api/shows/:show_id
pub async fn get_show(
    State(state): State<AppState>,
    Path(show_id): Path<Uuid>,
) -> ApiResult<Json<Show>> {
    Ok(Json(state.ledger.get_show(show_id).await?))
}

/// POST /api/shows/:show_id/setlist
pub async fn create_setlist(
    State(state): State<AppState>,
    Path(show_id): Path<Uuid>,
    Json(request): Json<CreateSetlistRequest>,
) -> ApiResult<(StatusCode, Json<Setlist>)> {
    let setlist = state.ledger.create_setlist(show_id, &request.songs).await?;
    Ok((StatusCode::CREATED, Json(setlist)))
}

/// GET /api/setlists/:setlist_id
pub async fn get_setlist(
    State(state): State<AppState>,
    Path(setlist_id): Path<Uuid>,
) -> ApiResult<Json<Setlist>> {
    Ok(Json(state.ledger.get_setlist(setlist_id).await?))
}

/// POST /api/setlists/:setlist_id/songs
pub async fn suggest_song(
    State(state): State<AppState>,
    Path(setlist_id): Path<Uuid>,
    Json(song): Json<NewSong>,
) -> ApiResult<(StatusCode, Json<SongSlot>)> {
    let slot = state.ledger.suggest_song(setlist_id, &song).await?;
    Ok((StatusCode::CREATED, Json(slot)))
}
