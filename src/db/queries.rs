//! Row-level statements over a borrowed connection.
//!
//! Everything here runs on whatever connection the caller hands in, usually an open
//! transaction, so several statements can commit or roll back together. Status changes are
//! conditional on the prior status and report whether a row was actually changed.

use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::errors::AppError;
use crate::lifecycle::{MatchStatus, RequestStatus};
use crate::matching::Candidate;
use crate::models::{
    NewNotification, Notification, NotificationKind, StudyMatch, StudyRequest, User, UserRating,
};

const REQUEST_COLUMNS: &str = "id, requester_id, bubble_id, skill_id, specific_topic, \
     learning_objectives, preferred_schedule, status, feedback, created_at";

const MATCH_COLUMNS: &str = "id, request_id, teacher_id, student_id, status, created_at";

pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ==================== USERS ====================

pub async fn fetch_user(conn: &mut SqliteConnection, id: &str) -> Result<Option<User>, AppError> {
    let row = sqlx::query(
        "SELECT id, username, department, study_year, current_bubble_id, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(user_from_row))
}

pub async fn set_current_bubble(
    conn: &mut SqliteConnection,
    user_id: &str,
    bubble_id: Option<&str>,
) -> Result<bool, AppError> {
    let result = sqlx::query("UPDATE users SET current_bubble_id = ? WHERE id = ?")
        .bind(bubble_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Proficiency of `user_id` in `skill_id`, if they offer to teach it.
pub async fn teaching_proficiency(
    conn: &mut SqliteConnection,
    user_id: &str,
    skill_id: &str,
) -> Result<Option<i64>, AppError> {
    let row = sqlx::query(
        "SELECT proficiency_level FROM user_skills WHERE user_id = ? AND skill_id = ? AND is_teaching = 1",
    )
    .bind(user_id)
    .bind(skill_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|r| r.get("proficiency_level")))
}

/// Users eligible to teach `skill_id` for the given request.
///
/// Eligible means: a teaching endorsement for the skill, not the requester, and a member of
/// some bubble.
pub async fn fetch_candidates(
    conn: &mut SqliteConnection,
    request_id: &str,
    skill_id: &str,
    requester_id: &str,
) -> Result<Vec<Candidate>, AppError> {
    let rows = sqlx::query(
        r#"SELECT u.id, u.username, u.department, u.study_year, us.proficiency_level,
                  EXISTS (
                      SELECT 1 FROM study_matches sm
                      WHERE sm.request_id = ? AND sm.teacher_id = u.id AND sm.status = 'pending'
                  ) AS has_request_pending
           FROM users u
           JOIN user_skills us ON us.user_id = u.id
           WHERE us.skill_id = ?
             AND us.is_teaching = 1
             AND u.id != ?
             AND u.current_bubble_id IS NOT NULL"#,
    )
    .bind(request_id)
    .bind(skill_id)
    .bind(requester_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let pending: i64 = row.get("has_request_pending");
            Candidate {
                user_id: row.get("id"),
                username: row.get("username"),
                department: row.get("department"),
                study_year: row.get("study_year"),
                proficiency_level: row.get("proficiency_level"),
                has_request_pending: pending != 0,
            }
        })
        .collect())
}

// ==================== CATALOG ====================

pub async fn bubble_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool, AppError> {
    let row = sqlx::query("SELECT 1 FROM bubbles WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

pub async fn skill_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool, AppError> {
    let row = sqlx::query("SELECT 1 FROM skills WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

// ==================== REQUESTS ====================

pub async fn fetch_request(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<StudyRequest>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM study_requests WHERE id = ?",
        REQUEST_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(request_from_row).transpose()
}

/// All requests owned by `requester_id` in `bubble_id`.
pub async fn fetch_requests_in_bubble(
    conn: &mut SqliteConnection,
    requester_id: &str,
    bubble_id: &str,
) -> Result<Vec<StudyRequest>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM study_requests WHERE requester_id = ? AND bubble_id = ?",
        REQUEST_COLUMNS
    ))
    .bind(requester_id)
    .bind(bubble_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(request_from_row).collect()
}

pub async fn insert_request(
    conn: &mut SqliteConnection,
    request: &StudyRequest,
) -> Result<(), AppError> {
    sqlx::query(&format!(
        "INSERT INTO study_requests ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        REQUEST_COLUMNS
    ))
    .bind(&request.id)
    .bind(&request.requester_id)
    .bind(&request.bubble_id)
    .bind(&request.skill_id)
    .bind(&request.specific_topic)
    .bind(&request.learning_objectives)
    .bind(&request.preferred_schedule)
    .bind(request.status.as_str())
    .bind(&request.feedback)
    .bind(&request.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Move a request from `from` to `to`. Returns false if it was no longer in `from`.
pub async fn update_request_status(
    conn: &mut SqliteConnection,
    request_id: &str,
    from: RequestStatus,
    to: RequestStatus,
) -> Result<bool, AppError> {
    let result = sqlx::query("UPDATE study_requests SET status = ? WHERE id = ? AND status = ?")
        .bind(to.as_str())
        .bind(request_id)
        .bind(from.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Like `update_request_status`, also storing completion feedback.
pub async fn complete_request(
    conn: &mut SqliteConnection,
    request_id: &str,
    from: RequestStatus,
    to: RequestStatus,
    feedback: Option<&str>,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE study_requests SET status = ?, feedback = ? WHERE id = ? AND status = ?",
    )
    .bind(to.as_str())
    .bind(feedback)
    .bind(request_id)
    .bind(from.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a request still in `from`. Dependents must already be gone.
pub async fn delete_request(
    conn: &mut SqliteConnection,
    request_id: &str,
    from: RequestStatus,
) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM study_requests WHERE id = ? AND status = ?")
        .bind(request_id)
        .bind(from.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ==================== MATCHES ====================

pub async fn fetch_match(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<StudyMatch>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM study_matches WHERE id = ?",
        MATCH_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(match_from_row).transpose()
}

/// The pending or active match of a request, if any.
pub async fn fetch_live_match(
    conn: &mut SqliteConnection,
    request_id: &str,
) -> Result<Option<StudyMatch>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM study_matches WHERE request_id = ? AND status IN ('pending', 'active')",
        MATCH_COLUMNS
    ))
    .bind(request_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(match_from_row).transpose()
}

/// The match of `teacher_id` on a request: the live one if any, otherwise the latest.
pub async fn fetch_teacher_match(
    conn: &mut SqliteConnection,
    request_id: &str,
    teacher_id: &str,
) -> Result<Option<StudyMatch>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM study_matches WHERE request_id = ? AND teacher_id = ? \
         ORDER BY status IN ('pending', 'active') DESC, created_at DESC, rowid DESC LIMIT 1",
        MATCH_COLUMNS
    ))
    .bind(request_id)
    .bind(teacher_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(match_from_row).transpose()
}

/// Pending or active matches in `bubble_id` where `user_id` teaches or learns.
pub async fn fetch_live_matches_in_bubble(
    conn: &mut SqliteConnection,
    user_id: &str,
    bubble_id: &str,
) -> Result<Vec<StudyMatch>, AppError> {
    let rows = sqlx::query(
        r#"SELECT sm.id, sm.request_id, sm.teacher_id, sm.student_id, sm.status, sm.created_at
           FROM study_matches sm
           JOIN study_requests sr ON sr.id = sm.request_id
           WHERE (sm.teacher_id = ? OR sm.student_id = ?)
             AND sr.bubble_id = ?
             AND sm.status IN ('pending', 'active')"#,
    )
    .bind(user_id)
    .bind(user_id)
    .bind(bubble_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(match_from_row).collect()
}

pub async fn insert_match(
    conn: &mut SqliteConnection,
    study_match: &StudyMatch,
) -> Result<(), AppError> {
    sqlx::query(&format!(
        "INSERT INTO study_matches ({}) VALUES (?, ?, ?, ?, ?, ?)",
        MATCH_COLUMNS
    ))
    .bind(&study_match.id)
    .bind(&study_match.request_id)
    .bind(&study_match.teacher_id)
    .bind(&study_match.student_id)
    .bind(study_match.status.as_str())
    .bind(&study_match.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Move a match from `from` to `to`. Returns false if it was no longer in `from`.
pub async fn update_match_status(
    conn: &mut SqliteConnection,
    match_id: &str,
    from: MatchStatus,
    to: MatchStatus,
) -> Result<bool, AppError> {
    let result = sqlx::query("UPDATE study_matches SET status = ? WHERE id = ? AND status = ?")
        .bind(to.as_str())
        .bind(match_id)
        .bind(from.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_match(
    conn: &mut SqliteConnection,
    match_id: &str,
    from: MatchStatus,
) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM study_matches WHERE id = ? AND status = ?")
        .bind(match_id)
        .bind(from.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_matches_for_request(
    conn: &mut SqliteConnection,
    request_id: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM study_matches WHERE request_id = ?")
        .bind(request_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

// ==================== NOTIFICATIONS & RATINGS ====================

pub async fn insert_notification(
    conn: &mut SqliteConnection,
    notification: &NewNotification,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO notifications (id, user_id, message, type, read, created_at) VALUES (?, ?, ?, ?, 0, ?)",
    )
    .bind(new_id())
    .bind(&notification.user_id)
    .bind(&notification.message)
    .bind(notification.kind.as_str())
    .bind(now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn insert_rating(
    conn: &mut SqliteConnection,
    rating: &UserRating,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO user_ratings (id, request_id, rater_id, rated_id, rating, comment, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&rating.id)
    .bind(&rating.request_id)
    .bind(&rating.rater_id)
    .bind(&rating.rated_id)
    .bind(rating.rating)
    .bind(&rating.comment)
    .bind(&rating.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete_ratings_for_request(
    conn: &mut SqliteConnection,
    request_id: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM user_ratings WHERE request_id = ?")
        .bind(request_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

// ==================== ROW CONVERSION ====================

pub fn user_from_row(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        department: row.get("department"),
        study_year: row.get("study_year"),
        current_bubble_id: row.get("current_bubble_id"),
        created_at: row.get("created_at"),
    }
}

pub fn request_from_row(row: &SqliteRow) -> Result<StudyRequest, AppError> {
    let status: String = row.get("status");
    Ok(StudyRequest {
        id: row.get("id"),
        requester_id: row.get("requester_id"),
        bubble_id: row.get("bubble_id"),
        skill_id: row.get("skill_id"),
        specific_topic: row.get("specific_topic"),
        learning_objectives: row.get("learning_objectives"),
        preferred_schedule: row.get("preferred_schedule"),
        status: parse_request_status(&status)?,
        feedback: row.get("feedback"),
        created_at: row.get("created_at"),
    })
}

pub fn match_from_row(row: &SqliteRow) -> Result<StudyMatch, AppError> {
    let status: String = row.get("status");
    Ok(StudyMatch {
        id: row.get("id"),
        request_id: row.get("request_id"),
        teacher_id: row.get("teacher_id"),
        student_id: row.get("student_id"),
        status: parse_match_status(&status)?,
        created_at: row.get("created_at"),
    })
}

pub fn notification_from_row(row: &SqliteRow) -> Result<Notification, AppError> {
    let kind: String = row.get("type");
    let read: i64 = row.get("read");
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        message: row.get("message"),
        kind: NotificationKind::parse(&kind)
            .ok_or_else(|| AppError::Internal(format!("Unknown notification type {}", kind)))?,
        read: read != 0,
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
pub fn rating_from_row(row: &SqliteRow) -> UserRating {
    UserRating {
        id: row.get("id"),
        request_id: row.get("request_id"),
        rater_id: row.get("rater_id"),
        rated_id: row.get("rated_id"),
        rating: row.get("rating"),
        comment: row.get("comment"),
        created_at: row.get("created_at"),
    }
}

pub fn parse_request_status(s: &str) -> Result<RequestStatus, AppError> {
    RequestStatus::parse(s)
        .ok_or_else(|| AppError::Internal(format!("Unknown request status {}", s)))
}

pub fn parse_match_status(s: &str) -> Result<MatchStatus, AppError> {
    MatchStatus::parse(s)
        .ok_or_else(|| AppError::Internal(format!("Unknown match status {}", s)))
}
