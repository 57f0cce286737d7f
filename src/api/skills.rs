//! Skill catalog endpoints.

use axum::{extract::State, Json};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateSkillRequest, Skill};
use crate::AppState;

/// GET /api/skills - List all skills.
pub async fn list_skills(State(state): State<AppState>) -> ApiResult<Vec<Skill>> {
    success(state.repo.list_skills().await?)
}

/// POST /api/skills - Add a skill.
pub async fn create_skill(
    State(state): State<AppState>,
    Json(request): Json<CreateSkillRequest>,
) -> ApiResult<Skill> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Skill name is required".to_string()));
    }

    success(state.repo.create_skill(&request).await?)
}
