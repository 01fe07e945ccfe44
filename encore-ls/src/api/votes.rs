//! Vote endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use encore_common::votes::{SubmitVoteRequest, UserVoteState, VoteCounts, VoteReceipt};
use tracing::debug;
use uuid::Uuid;

use crate::api::identity::Voter;
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/setlists/:setlist_id/counts
pub async fn get_vote_counts(
    State(state): State<AppState>,
    Path(setlist_id): Path<Uuid>,
) -> ApiResult<Json<VoteCounts>> {
    Ok(Json(state.ledger.vote_counts(setlist_id).await?))
}

/// GET /api/shows/:show_id/votes/me
pub async fn get_my_votes(
    State(state): State<AppState>,
    voter: Voter,
    Path(show_id): Path<Uuid>,
) -> ApiResult<Json<UserVoteState>> {
    Ok(Json(state.ledger.user_vote_state(&voter.user_id, show_id).await?))
}

/// POST /api/votes
///
/// Atomic insert-and-increment. Policy refusals come back as structured
/// errors (`already_voted`, `show_limit_reached`, `daily_limit_reached`,
/// `not_found`).
pub async fn submit_vote(
    State(state): State<AppState>,
    voter: Voter,
    Json(request): Json<SubmitVoteRequest>,
) -> ApiResult<Json<VoteReceipt>> {
    debug!(user_id = %voter.user_id, song_slot_id = %request.song_slot_id, "Vote submitted");
    let receipt = state
        .ledger
        .submit_vote(&voter.user_id, voter.display_name.as_deref(), request.song_slot_id)
        .await?;
    Ok(Json(receipt))
}
