//! Database repository for directory, catalog and listing operations.
//!
//! Uses prepared statements and transactions for data integrity. State transitions of requests
//! and matches live in `lifecycle`; this type only reads them.

use sqlx::{Row, SqliteConnection, SqlitePool};

use super::queries::{self, notification_from_row, request_from_row};
use crate::errors::AppError;
use crate::models::{
    Bubble, BubbleRequestListing, BubblesOverview, CreateBubbleRequest, CreateSkillRequest,
    CreateUserRequest, MatchListing, MatchRole, MyRequestListing, Notification, Skill,
    SkillEndorsement, TeachingSkillInput, UpdateProfileRequest, User, UserProfile,
};

/// Database repository for all non-lifecycle data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ==================== USER OPERATIONS ====================

    /// Provision a user and their teaching skills.
    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<User, AppError> {
        request.validate().map_err(AppError::Validation)?;

        let mut tx = self.pool.begin().await?;

        ensure_skills_exist(&mut tx, &request.teaching_skills).await?;

        let user = User {
            id: queries::new_id(),
            username: request.username.trim().to_string(),
            department: request.department.trim().to_string(),
            study_year: request.study_year,
            current_bubble_id: None,
            created_at: queries::now(),
        };

        sqlx::query(
            "INSERT INTO users (id, username, department, study_year, current_bubble_id, created_at) VALUES (?, ?, ?, ?, NULL, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.department)
        .bind(user.study_year)
        .bind(&user.created_at)
        .execute(&mut *tx)
        .await?;

        upsert_teaching_skills(&mut tx, &user.id, &request.teaching_skills).await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, skills = request.teaching_skills.len(), "User provisioned");
        Ok(user)
    }

    /// Update the caller's own record. Given teaching skills replace the current ones.
    pub async fn update_profile(
        &self,
        user_id: &str,
        request: &UpdateProfileRequest,
    ) -> Result<UserProfile, AppError> {
        request.validate().map_err(AppError::Validation)?;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE users SET username = ?, department = ?, study_year = ? WHERE id = ?",
        )
        .bind(request.username.trim())
        .bind(request.department.trim())
        .bind(request.study_year)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        if let Some(skills) = &request.teaching_skills {
            ensure_skills_exist(&mut tx, skills).await?;
            sqlx::query("DELETE FROM user_skills WHERE user_id = ? AND is_teaching = 1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            upsert_teaching_skills(&mut tx, user_id, skills).await?;
        }

        tx.commit().await?;

        tracing::info!(user_id, "Profile updated");
        self.get_profile(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_user(&mut conn, id).await
    }

    /// Get a user's profile with their skill endorsements.
    pub async fn get_profile(&self, id: &str) -> Result<Option<UserProfile>, AppError> {
        let Some(user) = self.get_user(id).await? else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"SELECT us.user_id, us.skill_id, s.name AS skill_name, us.proficiency_level, us.is_teaching
               FROM user_skills us
               JOIN skills s ON s.id = us.skill_id
               WHERE us.user_id = ?
               ORDER BY s.name"#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let skills = rows
            .iter()
            .map(|row| {
                let is_teaching: i64 = row.get("is_teaching");
                SkillEndorsement {
                    user_id: row.get("user_id"),
                    skill_id: row.get("skill_id"),
                    skill_name: row.get("skill_name"),
                    proficiency_level: row.get("proficiency_level"),
                    is_teaching: is_teaching != 0,
                }
            })
            .collect();

        Ok(Some(UserProfile { user, skills }))
    }

    // ==================== CATALOG OPERATIONS ====================

    /// List all skills.
    pub async fn list_skills(&self) -> Result<Vec<Skill>, AppError> {
        let rows = sqlx::query("SELECT id, name, bubble_id FROM skills ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(skill_from_row).collect())
    }

    /// List the skills that belong to a bubble.
    pub async fn list_bubble_skills(&self, bubble_id: &str) -> Result<Vec<Skill>, AppError> {
        let rows =
            sqlx::query("SELECT id, name, bubble_id FROM skills WHERE bubble_id = ? ORDER BY name")
                .bind(bubble_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.iter().map(skill_from_row).collect())
    }

    /// Add a skill to the catalog.
    pub async fn create_skill(&self, request: &CreateSkillRequest) -> Result<Skill, AppError> {
        if let Some(bubble_id) = &request.bubble_id {
            if self.get_bubble(bubble_id).await?.is_none() {
                return Err(AppError::NotFound(format!("Bubble {} not found", bubble_id)));
            }
        }

        let skill = Skill {
            id: queries::new_id(),
            name: request.name.trim().to_string(),
            bubble_id: request.bubble_id.clone(),
        };

        sqlx::query("INSERT INTO skills (id, name, bubble_id) VALUES (?, ?, ?)")
            .bind(&skill.id)
            .bind(&skill.name)
            .bind(&skill.bubble_id)
            .execute(&self.pool)
            .await?;

        Ok(skill)
    }

    /// List all bubbles.
    pub async fn list_bubbles(&self) -> Result<Vec<Bubble>, AppError> {
        let rows = sqlx::query("SELECT id, name, description, created_at FROM bubbles ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(bubble_from_row).collect())
    }

    /// Get a bubble by ID.
    pub async fn get_bubble(&self, id: &str) -> Result<Option<Bubble>, AppError> {
        let row = sqlx::query("SELECT id, name, description, created_at FROM bubbles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(bubble_from_row))
    }

    /// Create a new bubble.
    pub async fn create_bubble(&self, request: &CreateBubbleRequest) -> Result<Bubble, AppError> {
        let bubble = Bubble {
            id: queries::new_id(),
            name: request.name.trim().to_string(),
            description: request.description.clone(),
            created_at: queries::now(),
        };

        sqlx::query("INSERT INTO bubbles (id, name, description, created_at) VALUES (?, ?, ?, ?)")
            .bind(&bubble.id)
            .bind(&bubble.name)
            .bind(&bubble.description)
            .bind(&bubble.created_at)
            .execute(&self.pool)
            .await?;

        Ok(bubble)
    }

    /// All bubbles plus the caller's current one.
    pub async fn bubbles_overview(&self, user_id: &str) -> Result<BubblesOverview, AppError> {
        let bubbles = self.list_bubbles().await?;
        let current_bubble = match self.get_user(user_id).await?.and_then(|u| u.current_bubble_id) {
            Some(bubble_id) => bubbles.iter().find(|b| b.id == bubble_id).cloned(),
            None => None,
        };

        Ok(BubblesOverview {
            bubbles,
            current_bubble,
        })
    }

    /// Make `bubble_id` the user's current bubble.
    ///
    /// Joining the bubble one is already in is a no-op; switching requires leaving first so
    /// nothing is left running in the old bubble.
    pub async fn join_bubble(&self, user_id: &str, bubble_id: &str) -> Result<Bubble, AppError> {
        let mut tx = self.pool.begin().await?;

        let user = queries::fetch_user(&mut tx, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        if !queries::bubble_exists(&mut tx, bubble_id).await? {
            return Err(AppError::NotFound(format!("Bubble {} not found", bubble_id)));
        }

        match user.current_bubble_id.as_deref() {
            Some(current) if current == bubble_id => {}
            Some(_) => {
                return Err(AppError::Conflict(
                    "Leave your current bubble before joining another".to_string(),
                ))
            }
            None => {
                queries::set_current_bubble(&mut tx, user_id, Some(bubble_id)).await?;
            }
        }

        tx.commit().await?;

        tracing::info!(user_id, bubble_id, "User joined bubble");
        self.get_bubble(bubble_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Bubble {} not found", bubble_id)))
    }

    // ==================== REQUEST & MATCH LISTINGS ====================

    /// Open requests in a bubble, flagged with whether the caller owns them.
    pub async fn list_bubble_requests(
        &self,
        bubble_id: &str,
        caller_id: &str,
    ) -> Result<Vec<BubbleRequestListing>, AppError> {
        let rows = sqlx::query(
            r#"SELECT sr.id, sr.requester_id, sr.bubble_id, sr.skill_id, sr.specific_topic,
                      sr.learning_objectives, sr.preferred_schedule, sr.status, sr.feedback,
                      sr.created_at, s.name AS skill_name, u.username AS requester_name
               FROM study_requests sr
               JOIN skills s ON s.id = sr.skill_id
               JOIN users u ON u.id = sr.requester_id
               WHERE sr.bubble_id = ? AND sr.status = 'open'
               ORDER BY sr.created_at DESC, sr.rowid DESC"#,
        )
        .bind(bubble_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let request = request_from_row(row)?;
                Ok(BubbleRequestListing {
                    is_own_request: request.requester_id == caller_id,
                    request,
                    skill_name: row.get("skill_name"),
                    requester_name: row.get("requester_name"),
                })
            })
            .collect()
    }

    /// All requests a user has posted, newest first.
    pub async fn list_my_requests(&self, user_id: &str) -> Result<Vec<MyRequestListing>, AppError> {
        let rows = sqlx::query(
            r#"SELECT sr.id, sr.requester_id, sr.bubble_id, sr.skill_id, sr.specific_topic,
                      sr.learning_objectives, sr.preferred_schedule, sr.status, sr.feedback,
                      sr.created_at, s.name AS skill_name, b.name AS bubble_name
               FROM study_requests sr
               JOIN skills s ON s.id = sr.skill_id
               JOIN bubbles b ON b.id = sr.bubble_id
               WHERE sr.requester_id = ?
               ORDER BY sr.created_at DESC, sr.rowid DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(MyRequestListing {
                    request: request_from_row(row)?,
                    skill_name: row.get("skill_name"),
                    bubble_name: row.get("bubble_name"),
                })
            })
            .collect()
    }

    /// Matches where the user teaches or learns, newest first.
    pub async fn list_matches(
        &self,
        user_id: &str,
        role: MatchRole,
    ) -> Result<Vec<MatchListing>, AppError> {
        let (own_column, other_column) = match role {
            MatchRole::Teaching => ("teacher_id", "student_id"),
            MatchRole::Learning => ("student_id", "teacher_id"),
        };

        let rows = sqlx::query(&format!(
            r#"SELECT m.id AS match_id, m.status AS match_status, sr.id AS request_id,
                      sr.specific_topic AS topic, sr.learning_objectives, sr.preferred_schedule,
                      sr.status AS request_status, sr.feedback, s.name AS skill_name,
                      u.username AS other_user, m.teacher_id, m.student_id
               FROM study_matches m
               JOIN study_requests sr ON sr.id = m.request_id
               JOIN skills s ON s.id = sr.skill_id
               JOIN users u ON u.id = m.{other}
               WHERE m.{own} = ?
               ORDER BY m.created_at DESC, m.rowid DESC"#,
            own = own_column,
            other = other_column,
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let match_status: String = row.get("match_status");
                let request_status: String = row.get("request_status");
                Ok(MatchListing {
                    match_id: row.get("match_id"),
                    match_status: queries::parse_match_status(&match_status)?,
                    request_id: row.get("request_id"),
                    topic: row.get("topic"),
                    learning_objectives: row.get("learning_objectives"),
                    preferred_schedule: row.get("preferred_schedule"),
                    request_status: queries::parse_request_status(&request_status)?,
                    feedback: row.get("feedback"),
                    skill_name: row.get("skill_name"),
                    other_user: row.get("other_user"),
                    teacher_id: row.get("teacher_id"),
                    student_id: row.get("student_id"),
                })
            })
            .collect()
    }

    // ==================== NOTIFICATION OPERATIONS ====================

    /// A user's notifications, newest first.
    pub async fn list_notifications(&self, user_id: &str) -> Result<Vec<Notification>, AppError> {
        let rows = sqlx::query(
            "SELECT id, user_id, message, type, read, created_at FROM notifications \
             WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(notification_from_row).collect()
    }

    /// Mark all of a user's notifications read. Returns how many changed.
    pub async fn mark_notifications_read(&self, user_id: &str) -> Result<u64, AppError> {
        let result =
            sqlx::query("UPDATE notifications SET read = 1 WHERE user_id = ? AND read = 0")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

/// Inspection helpers for tests.
#[cfg(test)]
impl Repository {
    /// Get a study request by ID.
    pub async fn get_request(
        &self,
        id: &str,
    ) -> Result<Option<crate::models::StudyRequest>, AppError> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_request(&mut conn, id).await
    }

    /// Get a match by ID.
    pub async fn get_match(&self, id: &str) -> Result<Option<crate::models::StudyMatch>, AppError> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_match(&mut conn, id).await
    }

    /// All matches recorded for a request, oldest first.
    pub async fn list_request_matches(
        &self,
        request_id: &str,
    ) -> Result<Vec<crate::models::StudyMatch>, AppError> {
        let rows = sqlx::query(
            "SELECT id, request_id, teacher_id, student_id, status, created_at FROM study_matches \
             WHERE request_id = ? ORDER BY created_at, rowid",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(queries::match_from_row).collect()
    }

    /// Ratings left on a request.
    pub async fn list_request_ratings(
        &self,
        request_id: &str,
    ) -> Result<Vec<crate::models::UserRating>, AppError> {
        let rows = sqlx::query(
            "SELECT id, request_id, rater_id, rated_id, rating, comment, created_at FROM user_ratings \
             WHERE request_id = ? ORDER BY created_at, rowid",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(queries::rating_from_row).collect())
    }
}

// Helper functions for row conversion

async fn ensure_skills_exist(
    conn: &mut SqliteConnection,
    skills: &[TeachingSkillInput],
) -> Result<(), AppError> {
    for skill in skills {
        if !queries::skill_exists(conn, &skill.skill_id).await? {
            return Err(AppError::NotFound(format!(
                "Skill {} not found",
                skill.skill_id
            )));
        }
    }
    Ok(())
}

async fn upsert_teaching_skills(
    conn: &mut SqliteConnection,
    user_id: &str,
    skills: &[TeachingSkillInput],
) -> Result<(), AppError> {
    for skill in skills {
        sqlx::query(
            "INSERT INTO user_skills (user_id, skill_id, proficiency_level, is_teaching) VALUES (?, ?, ?, 1) \
             ON CONFLICT (user_id, skill_id) DO UPDATE SET proficiency_level = excluded.proficiency_level, is_teaching = 1",
        )
        .bind(user_id)
        .bind(&skill.skill_id)
        .bind(skill.proficiency)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn skill_from_row(row: &sqlx::sqlite::SqliteRow) -> Skill {
    Skill {
        id: row.get("id"),
        name: row.get("name"),
        bubble_id: row.get("bubble_id"),
    }
}

fn bubble_from_row(row: &sqlx::sqlite::SqliteRow) -> Bubble {
    Bubble {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}
