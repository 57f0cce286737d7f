//! User directory endpoints.

use axum::{extract::State, Json};

use super::{success, ApiResult};
use crate::auth::Caller;
use crate::errors::AppError;
use crate::models::{CreateUserRequest, UpdateProfileRequest, User, UserProfile};
use crate::AppState;

/// POST /api/users - Provision a user in the directory.
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<User> {
    success(state.repo.create_user(&request).await?)
}

/// GET /api/user/profile - The caller's profile.
pub async fn get_profile(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> ApiResult<UserProfile> {
    match state.repo.get_profile(&user_id).await? {
        Some(profile) => success(profile),
        None => Err(AppError::NotFound(format!("User {} not found", user_id))),
    }
}

/// PUT /api/user/profile - Update the caller's own record.
pub async fn update_profile(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<UserProfile> {
    success(state.repo.update_profile(&user_id, &request).await?)
}
