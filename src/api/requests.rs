//! Study request endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::auth::Caller;
use crate::matching::RankedCandidate;
use crate::models::{
    CreateStudyRequest, MyRequestListing, RespondRequest, StudyMatch, StudyRequest,
};
use crate::AppState;

/// POST /api/study-requests - Post a request in the caller's bubble.
pub async fn create_request(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(request): Json<CreateStudyRequest>,
) -> ApiResult<StudyRequest> {
    success(state.lifecycle.create_request(&user_id, &request).await?)
}

/// GET /api/my-requests - The caller's requests, newest first.
pub async fn list_my_requests(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> ApiResult<Vec<MyRequestListing>> {
    success(state.repo.list_my_requests(&user_id).await?)
}

/// DELETE /api/study-requests/{id} - Delete a request that never became a session.
pub async fn delete_request(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.lifecycle.delete_request(&id, &user_id).await?;
    success(())
}

/// POST /api/study-requests/{id}/cancel - Withdraw a pending request.
pub async fn cancel_request(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> ApiResult<StudyRequest> {
    success(state.lifecycle.cancel_pending(&id, &user_id).await?)
}

/// POST /api/study-requests/{id}/respond - The targeted teacher accepts or declines.
pub async fn respond_to_request(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
    Json(body): Json<RespondRequest>,
) -> ApiResult<StudyMatch> {
    success(state.lifecycle.respond(&id, &user_id, body.accepted).await?)
}

/// GET /api/potential-matches/{requestId} - Ranked teachers for a request.
pub async fn potential_matches(
    State(state): State<AppState>,
    Caller(_user_id): Caller,
    Path(request_id): Path<String>,
) -> ApiResult<Vec<RankedCandidate>> {
    success(state.lifecycle.compute_ranked_candidates(&request_id).await?)
}
