// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Running group routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::CurrentUser;
use crate::models::group::{
    CancelParticipationRequest, CreateGroupRequest, GroupParticipants, GroupSummary,
    MainPageGroup, ParticipationResponse,
};
use crate::models::GroupTag;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Maximum accepted length of a search word.
const MAX_SEARCH_WORD_LEN: usize = 100;

/// Running group routes. The current user is resolved in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/groups", get(list_upcoming).post(create_group))
        .route("/api/groups/main", get(main_page_groups))
        .route("/api/groups/search", get(filter_groups))
        .route("/api/groups/quick/participate", post(participate_quick_match))
        .route("/api/groups/participation/cancel", post(cancel_participation))
        .route("/api/groups/{group_id}", get(group_participants))
        .route("/api/groups/{group_id}/participate", post(participate))
}

// ─── Creation & Participation ────────────────────────────────

async fn create_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupSummary>)> {
    let group = state.groups.create_group(request, user.user()).await?;
    Ok((StatusCode::CREATED, Json(group.into())))
}

async fn participate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(group_id): Path<u64>,
) -> Result<Json<ParticipationResponse>> {
    Ok(Json(state.groups.participate(group_id, user.user()).await?))
}

async fn participate_quick_match(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ParticipationResponse>> {
    Ok(Json(state.groups.participate_quick_match(user.user()).await?))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CancelParticipationResponse {
    pub success: bool,
}

async fn cancel_participation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CancelParticipationRequest>,
) -> Result<Json<CancelParticipationResponse>> {
    let user = user.user().ok_or(AppError::Unauthorized)?;

    state
        .groups
        .cancel_participation(request.group_id, request.record_id, Some(user))
        .await?;

    Ok(Json(CancelParticipationResponse { success: true }))
}

// ─── Listing & Search ────────────────────────────────────────

async fn list_upcoming(State(state): State<Arc<AppState>>) -> Result<Json<Vec<GroupSummary>>> {
    Ok(Json(state.groups.list_upcoming_groups().await?))
}

async fn main_page_groups(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MainPageGroup>>> {
    Ok(Json(state.groups.list_main_page_groups().await?))
}

#[derive(Deserialize)]
struct FilterQuery {
    /// Restrict to one tag; all tags when absent
    tag: Option<GroupTag>,
    /// Case-sensitive title substring
    #[serde(default)]
    search_word: String,
}

async fn filter_groups(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterQuery>,
) -> Result<Json<Vec<GroupSummary>>> {
    if params.search_word.len() > MAX_SEARCH_WORD_LEN {
        return Err(AppError::InvalidArgument(format!(
            "search word must be at most {} characters",
            MAX_SEARCH_WORD_LEN
        )));
    }

    tracing::debug!(tag = ?params.tag, search_word = %params.search_word, "Filtering groups");

    Ok(Json(
        state
            .groups
            .filter_groups(params.tag, &params.search_word)
            .await?,
    ))
}

async fn group_participants(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<u64>,
) -> Result<Json<GroupParticipants>> {
    Ok(Json(state.groups.group_participants(group_id).await?))
}
