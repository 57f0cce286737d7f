//! Match endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::auth::Caller;
use crate::errors::AppError;
use crate::models::{
    CompleteMatchRequest, MatchListing, MatchRole, SelectTeacherRequest, StudyMatch, UserRating,
};
use crate::AppState;

/// POST /api/matches/{requestId}/accept - Send an open request to a teacher.
pub async fn select_teacher(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(request_id): Path<String>,
    Json(body): Json<SelectTeacherRequest>,
) -> ApiResult<StudyMatch> {
    if body.teacher_id.trim().is_empty() {
        return Err(AppError::Validation("teacherId is required".to_string()));
    }

    success(
        state
            .lifecycle
            .select_teacher(&request_id, &body.teacher_id, &user_id)
            .await?,
    )
}

/// GET /api/matches/{type} - Matches where the caller teaches or learns.
pub async fn list_matches(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(kind): Path<String>,
) -> ApiResult<Vec<MatchListing>> {
    let role = MatchRole::parse(&kind).ok_or_else(|| {
        AppError::Validation(format!(
            "Unknown match type '{}', expected teaching or learning",
            kind
        ))
    })?;

    success(state.repo.list_matches(&user_id, role).await?)
}

/// POST /api/matches/{id}/complete - Complete an active match and rate the other side.
pub async fn complete_match(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
    Json(body): Json<CompleteMatchRequest>,
) -> ApiResult<UserRating> {
    success(
        state
            .lifecycle
            .complete(&id, &user_id, body.rating, body.feedback.as_deref())
            .await?,
    )
}

/// POST /api/matches/{id}/cancel - Call off an active match.
pub async fn cancel_match(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> ApiResult<StudyMatch> {
    success(state.lifecycle.cancel_active(&id, &user_id).await?)
}
