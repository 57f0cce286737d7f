//! Bubble endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::auth::Caller;
use crate::errors::AppError;
use crate::lifecycle::LeaveSummary;
use crate::models::{Bubble, BubbleRequestListing, BubblesOverview, CreateBubbleRequest, Skill};
use crate::AppState;

/// GET /api/bubbles - All bubbles and the caller's current one.
pub async fn list_bubbles(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> ApiResult<BubblesOverview> {
    success(state.repo.bubbles_overview(&user_id).await?)
}

/// POST /api/bubbles - Create a bubble.
pub async fn create_bubble(
    State(state): State<AppState>,
    Json(request): Json<CreateBubbleRequest>,
) -> ApiResult<Bubble> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Bubble name is required".to_string()));
    }

    success(state.repo.create_bubble(&request).await?)
}

/// GET /api/bubbles/{id} - Bubble details.
pub async fn get_bubble(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Bubble> {
    match state.repo.get_bubble(&id).await? {
        Some(bubble) => success(bubble),
        None => Err(AppError::NotFound(format!("Bubble {} not found", id))),
    }
}

/// GET /api/bubbles/{id}/skills - Skills belonging to a bubble.
pub async fn list_bubble_skills(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Skill>> {
    success(state.repo.list_bubble_skills(&id).await?)
}

/// GET /api/bubbles/{id}/requests - Open requests in a bubble.
pub async fn list_bubble_requests(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> ApiResult<Vec<BubbleRequestListing>> {
    if state.repo.get_bubble(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("Bubble {} not found", id)));
    }

    success(state.repo.list_bubble_requests(&id, &user_id).await?)
}

/// POST /api/bubbles/{id}/join - Join a bubble.
pub async fn join_bubble(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> ApiResult<Bubble> {
    success(state.repo.join_bubble(&user_id, &id).await?)
}

/// POST /api/bubbles/leave - Leave the current bubble.
pub async fn leave_bubble(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> ApiResult<LeaveSummary> {
    success(state.lifecycle.leave_bubble(&user_id).await?)
}
