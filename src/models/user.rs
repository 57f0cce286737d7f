//! Users and their skill endorsements.
//!
//! Users are provisioned by the auth gateway; credentials never reach this service.

use serde::{Deserialize, Serialize};

/// Lowest self-declared proficiency.
pub const MIN_PROFICIENCY: i64 = 1;
/// Highest self-declared proficiency.
pub const MAX_PROFICIENCY: i64 = 5;

/// A registered student.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub department: String,
    pub study_year: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_bubble_id: Option<String>,
    pub created_at: String,
}

/// A user's declared ability in one skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillEndorsement {
    pub user_id: String,
    pub skill_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_name: Option<String>,
    pub proficiency_level: i64,
    pub is_teaching: bool,
}

/// Profile view of the calling user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub skills: Vec<SkillEndorsement>,
}

/// One skill offered for teaching at registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachingSkillInput {
    pub skill_id: String,
    pub proficiency: i64,
}

/// Request body for provisioning a user in the directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub department: String,
    pub study_year: i64,
    #[serde(default)]
    pub teaching_skills: Vec<TeachingSkillInput>,
}

impl CreateUserRequest {
    /// Check the fields the database cannot check for us.
    pub fn validate(&self) -> Result<(), String> {
        validate_profile_fields(
            &self.username,
            &self.department,
            self.study_year,
            &self.teaching_skills,
        )
    }
}

/// Request body for the caller updating their own directory record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub username: String,
    pub department: String,
    pub study_year: i64,
    /// Replaces the taught skills when present. Absent leaves them untouched.
    #[serde(default)]
    pub teaching_skills: Option<Vec<TeachingSkillInput>>,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_profile_fields(
            &self.username,
            &self.department,
            self.study_year,
            self.teaching_skills.as_deref().unwrap_or_default(),
        )
    }
}

fn validate_profile_fields(
    username: &str,
    department: &str,
    study_year: i64,
    teaching_skills: &[TeachingSkillInput],
) -> Result<(), String> {
    if username.trim().is_empty() {
        return Err("Username is required".to_string());
    }
    if department.trim().is_empty() {
        return Err("Department is required".to_string());
    }
    if study_year < 1 {
        return Err("Study year must be at least 1".to_string());
    }
    for skill in teaching_skills {
        if !(MIN_PROFICIENCY..=MAX_PROFICIENCY).contains(&skill.proficiency) {
            return Err(format!(
                "Proficiency for skill {} must be between {} and {}",
                skill.skill_id, MIN_PROFICIENCY, MAX_PROFICIENCY
            ));
        }
    }
    Ok(())
}
