// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user record routes.

use crate::error::Result;
use crate::middleware::auth::CurrentUser;
use crate::models::WeeklyRecordSummary;
use crate::AppState;
use axum::{extract::State, routing::get, Extension, Json, Router};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/me/records", get(weekly_records))
}

/// Seven-day summary of the current user's records.
async fn weekly_records(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<WeeklyRecordSummary>> {
    Ok(Json(state.groups.weekly_records(user.user()).await?))
}
