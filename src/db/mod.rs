//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all application data.

pub mod queries;
mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bubbles (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS skills (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            bubble_id TEXT REFERENCES bubbles(id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            department TEXT NOT NULL,
            study_year INTEGER NOT NULL CHECK (study_year >= 1),
            current_bubble_id TEXT REFERENCES bubbles(id),
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_skills (
            user_id TEXT NOT NULL REFERENCES users(id),
            skill_id TEXT NOT NULL REFERENCES skills(id),
            proficiency_level INTEGER NOT NULL CHECK (proficiency_level BETWEEN 1 AND 5),
            is_teaching INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, skill_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS study_requests (
            id TEXT PRIMARY KEY,
            requester_id TEXT NOT NULL REFERENCES users(id),
            bubble_id TEXT NOT NULL REFERENCES bubbles(id),
            skill_id TEXT NOT NULL REFERENCES skills(id),
            specific_topic TEXT NOT NULL,
            learning_objectives TEXT,
            preferred_schedule TEXT,
            status TEXT NOT NULL DEFAULT 'open',
            feedback TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS study_matches (
            id TEXT PRIMARY KEY,
            request_id TEXT NOT NULL REFERENCES study_requests(id),
            teacher_id TEXT NOT NULL REFERENCES users(id),
            student_id TEXT NOT NULL REFERENCES users(id),
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        -- At most one pending or active match per request.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_matches_live_request
            ON study_matches(request_id) WHERE status IN ('pending', 'active');
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            message TEXT NOT NULL,
            type TEXT NOT NULL,
            read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_ratings (
            id TEXT PRIMARY KEY,
            request_id TEXT NOT NULL REFERENCES study_requests(id),
            rater_id TEXT NOT NULL REFERENCES users(id),
            rated_id TEXT NOT NULL REFERENCES users(id),
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            comment TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_requests_bubble_status ON study_requests(bubble_id, status);
        CREATE INDEX IF NOT EXISTS idx_requests_requester ON study_requests(requester_id);
        CREATE INDEX IF NOT EXISTS idx_matches_request ON study_matches(request_id);
        CREATE INDEX IF NOT EXISTS idx_matches_teacher ON study_matches(teacher_id);
        CREATE INDEX IF NOT EXISTS idx_matches_student ON study_matches(student_id);
        CREATE INDEX IF NOT EXISTS idx_user_skills_skill ON user_skills(skill_id, is_teaching);
        CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_ratings_request ON user_ratings(request_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
