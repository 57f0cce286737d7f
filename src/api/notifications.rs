//! Notification endpoints.

use axum::extract::State;
use serde::Serialize;

use super::{success, ApiResult};
use crate::auth::Caller;
use crate::models::Notification;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedRead {
    pub updated: u64,
}

/// GET /api/notifications - The caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> ApiResult<Vec<Notification>> {
    success(state.repo.list_notifications(&user_id).await?)
}

/// PUT /api/notifications/read - Mark all of the caller's notifications read.
pub async fn mark_notifications_read(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> ApiResult<MarkedRead> {
    let updated = state.repo.mark_notifications_read(&user_id).await?;
    success(MarkedRead { updated })
}
