//! Request and match lifecycle.
//!
//! `state` holds the transition tables, `ops` the transitions with their side effects, and
//! `LifecycleManager` runs each operation inside its own SQLite transaction.

mod notify;
pub mod ops;
mod state;

pub use ops::LeaveSummary;
pub use state::{MatchEvent, MatchStatus, RequestEvent, RequestStatus};

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::errors::AppError;
use crate::matching::RankedCandidate;
use crate::models::{CreateStudyRequest, StudyMatch, StudyRequest, UserRating};

/// Runs lifecycle operations atomically against the database.
#[derive(Clone)]
pub struct LifecycleManager {
    pool: SqlitePool,
}

impl LifecycleManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a write transaction holding SQLite's write lock from the start. A concurrent
    /// operation waits for the commit and then reads the state it left behind.
    async fn begin(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    pub async fn create_request(
        &self,
        requester_id: &str,
        input: &CreateStudyRequest,
    ) -> Result<StudyRequest, AppError> {
        let mut tx = self.begin().await?;
        let request = ops::create_request(&mut tx, requester_id, input).await?;
        tx.commit().await?;
        Ok(request)
    }

    /// Read-only; runs on a plain pooled connection.
    pub async fn compute_ranked_candidates(
        &self,
        request_id: &str,
    ) -> Result<Vec<RankedCandidate>, AppError> {
        let mut conn = self.pool.acquire().await?;
        ops::compute_ranked_candidates(&mut conn, request_id).await
    }

    pub async fn select_teacher(
        &self,
        request_id: &str,
        teacher_id: &str,
        student_id: &str,
    ) -> Result<StudyMatch, AppError> {
        let mut tx = self.begin().await?;
        let study_match = ops::select_teacher(&mut tx, request_id, teacher_id, student_id).await?;
        tx.commit().await?;
        Ok(study_match)
    }

    pub async fn respond(
        &self,
        request_id: &str,
        teacher_id: &str,
        accepted: bool,
    ) -> Result<StudyMatch, AppError> {
        let mut tx = self.begin().await?;
        let study_match = ops::respond(&mut tx, request_id, teacher_id, accepted).await?;
        tx.commit().await?;
        Ok(study_match)
    }

    pub async fn cancel_pending(
        &self,
        request_id: &str,
        requester_id: &str,
    ) -> Result<StudyRequest, AppError> {
        let mut tx = self.begin().await?;
        let request = ops::cancel_pending(&mut tx, request_id, requester_id).await?;
        tx.commit().await?;
        Ok(request)
    }

    pub async fn cancel_active(
        &self,
        match_id: &str,
        actor_id: &str,
    ) -> Result<StudyMatch, AppError> {
        let mut tx = self.begin().await?;
        let study_match = ops::cancel_active(&mut tx, match_id, actor_id).await?;
        tx.commit().await?;
        Ok(study_match)
    }

    pub async fn complete(
        &self,
        match_id: &str,
        actor_id: &str,
        rating: i64,
        feedback: Option<&str>,
    ) -> Result<UserRating, AppError> {
        let mut tx = self.begin().await?;
        let user_rating = ops::complete(&mut tx, match_id, actor_id, rating, feedback).await?;
        tx.commit().await?;
        Ok(user_rating)
    }

    pub async fn leave_bubble(&self, user_id: &str) -> Result<LeaveSummary, AppError> {
        let mut tx = self.begin().await?;
        let summary = ops::leave_bubble(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(summary)
    }

    pub async fn delete_request(&self, request_id: &str, requester_id: &str) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        ops::delete_request(&mut tx, request_id, requester_id).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_database, queries, Repository};
    use crate::models::{
        CreateBubbleRequest, CreateSkillRequest, CreateUserRequest, NotificationKind,
        TeachingSkillInput,
    };
    use tempfile::TempDir;

    struct World {
        repo: Repository,
        lifecycle: LifecycleManager,
        bubble_id: String,
        other_bubble_id: String,
        skill_id: String,
        _temp_dir: TempDir,
    }

    impl World {
        async fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let pool = init_database(&temp_dir.path().join("test.sqlite"))
                .await
                .unwrap();
            let repo = Repository::new(pool.clone());

            let bubble = repo
                .create_bubble(&CreateBubbleRequest {
                    name: "Algorithms".to_string(),
                    description: None,
                })
                .await
                .unwrap();
            let other = repo
                .create_bubble(&CreateBubbleRequest {
                    name: "Databases".to_string(),
                    description: None,
                })
                .await
                .unwrap();
            let skill = repo
                .create_skill(&CreateSkillRequest {
                    name: "Dynamic Programming".to_string(),
                    bubble_id: Some(bubble.id.clone()),
                })
                .await
                .unwrap();

            World {
                repo,
                lifecycle: LifecycleManager::new(pool),
                bubble_id: bubble.id,
                other_bubble_id: other.id,
                skill_id: skill.id,
                _temp_dir: temp_dir,
            }
        }

        /// A user in the main bubble, teaching the skill at `proficiency` if given.
        async fn user(&self, name: &str, department: &str, year: i64, proficiency: Option<i64>) -> String {
            self.user_in(&self.bubble_id, name, department, year, proficiency)
                .await
        }

        async fn user_in(
            &self,
            bubble_id: &str,
            name: &str,
            department: &str,
            year: i64,
            proficiency: Option<i64>,
        ) -> String {
            let teaching_skills = proficiency
                .map(|p| {
                    vec![TeachingSkillInput {
                        skill_id: self.skill_id.clone(),
                        proficiency: p,
                    }]
                })
                .unwrap_or_default();
            let user = self
                .repo
                .create_user(&CreateUserRequest {
                    username: name.to_string(),
                    department: department.to_string(),
                    study_year: year,
                    teaching_skills,
                })
                .await
                .unwrap();
            self.repo.join_bubble(&user.id, bubble_id).await.unwrap();
            user.id
        }

        async fn open_request(&self, student: &str) -> String {
            self.lifecycle
                .create_request(
                    student,
                    &CreateStudyRequest {
                        bubble_id: self.bubble_id.clone(),
                        skill_id: self.skill_id.clone(),
                        specific_topic: "Knapsack".to_string(),
                        learning_objectives: None,
                        preferred_schedule: None,
                    },
                )
                .await
                .unwrap()
                .id
        }

        async fn request_status(&self, request_id: &str) -> RequestStatus {
            self.repo.get_request(request_id).await.unwrap().unwrap().status
        }

        async fn kinds(&self, user_id: &str) -> Vec<NotificationKind> {
            self.repo
                .list_notifications(user_id)
                .await
                .unwrap()
                .into_iter()
                .map(|n| n.kind)
                .collect()
        }
    }

    #[tokio::test]
    async fn test_full_lifecycle_to_completion() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let teacher = world.user("tono", "Informatics", 4, Some(5)).await;
        let request_id = world.open_request(&student).await;

        let pending = world
            .lifecycle
            .select_teacher(&request_id, &teacher, &student)
            .await
            .unwrap();
        assert_eq!(pending.status, MatchStatus::Pending);
        assert_eq!(world.request_status(&request_id).await, RequestStatus::Pending);
        assert_eq!(world.kinds(&teacher).await, vec![NotificationKind::NewRequest]);
        assert_eq!(world.kinds(&student).await, vec![NotificationKind::RequestSent]);

        let active = world.lifecycle.respond(&request_id, &teacher, true).await.unwrap();
        assert_eq!(active.status, MatchStatus::Active);
        assert_eq!(world.request_status(&request_id).await, RequestStatus::Active);

        let rating = world
            .lifecycle
            .complete(&active.id, &student, 5, Some("Great session"))
            .await
            .unwrap();
        assert_eq!(rating.rater_id, student);
        assert_eq!(rating.rated_id, teacher);

        let request = world.repo.get_request(&request_id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Completed);
        assert_eq!(request.feedback.as_deref(), Some("Great session"));
        let stored = world.repo.get_match(&active.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Completed);
        assert_eq!(world.kinds(&teacher).await[0], NotificationKind::MatchCompleted);
    }

    #[tokio::test]
    async fn test_teacher_completing_rates_the_student() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let teacher = world.user("tono", "Informatics", 4, Some(5)).await;
        let request_id = world.open_request(&student).await;
        let study_match = world
            .lifecycle
            .select_teacher(&request_id, &teacher, &student)
            .await
            .unwrap();
        world.lifecycle.respond(&request_id, &teacher, true).await.unwrap();

        let rating = world
            .lifecycle
            .complete(&study_match.id, &teacher, 4, None)
            .await
            .unwrap();
        assert_eq!(rating.rater_id, teacher);
        assert_eq!(rating.rated_id, student);

        let ratings = world.repo.list_request_ratings(&request_id).await.unwrap();
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings[0].rating, 4);
    }

    #[tokio::test]
    async fn test_complete_rejects_out_of_range_rating() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let teacher = world.user("tono", "Informatics", 4, Some(5)).await;
        let request_id = world.open_request(&student).await;
        let study_match = world
            .lifecycle
            .select_teacher(&request_id, &teacher, &student)
            .await
            .unwrap();
        world.lifecycle.respond(&request_id, &teacher, true).await.unwrap();

        let err = world
            .lifecycle
            .complete(&study_match.id, &student, 6, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(world.request_status(&request_id).await, RequestStatus::Active);
    }

    #[tokio::test]
    async fn test_complete_requires_active_match() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let teacher = world.user("tono", "Informatics", 4, Some(5)).await;
        let request_id = world.open_request(&student).await;
        let study_match = world
            .lifecycle
            .select_teacher(&request_id, &teacher, &student)
            .await
            .unwrap();

        let err = world
            .lifecycle
            .complete(&study_match.id, &student, 5, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_second_response_conflicts_without_side_effects() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let teacher = world.user("tono", "Informatics", 4, Some(5)).await;
        let request_id = world.open_request(&student).await;
        world
            .lifecycle
            .select_teacher(&request_id, &teacher, &student)
            .await
            .unwrap();

        world.lifecycle.respond(&request_id, &teacher, true).await.unwrap();
        let err = world
            .lifecycle
            .respond(&request_id, &teacher, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        assert_eq!(world.request_status(&request_id).await, RequestStatus::Active);
        assert_eq!(
            world.kinds(&student).await,
            vec![NotificationKind::RequestAccepted, NotificationKind::RequestSent]
        );
    }

    #[tokio::test]
    async fn test_decline_reopens_request() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let first = world.user("tono", "Informatics", 4, Some(5)).await;
        let second = world.user("wati", "Physics", 3, Some(4)).await;
        let request_id = world.open_request(&student).await;

        world
            .lifecycle
            .select_teacher(&request_id, &first, &student)
            .await
            .unwrap();
        let declined = world.lifecycle.respond(&request_id, &first, false).await.unwrap();
        assert_eq!(declined.status, MatchStatus::Declined);
        assert_eq!(world.request_status(&request_id).await, RequestStatus::Open);
        assert_eq!(world.kinds(&student).await[0], NotificationKind::RequestDeclined);

        // The student may now pick someone else.
        world
            .lifecycle
            .select_teacher(&request_id, &second, &student)
            .await
            .unwrap();
        let matches = world.repo.list_request_matches(&request_id).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches.iter().filter(|m| m.status.is_live()).count(), 1);
    }

    #[tokio::test]
    async fn test_second_selection_conflicts() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let first = world.user("tono", "Informatics", 4, Some(5)).await;
        let second = world.user("wati", "Physics", 3, Some(4)).await;
        let request_id = world.open_request(&student).await;

        world
            .lifecycle
            .select_teacher(&request_id, &first, &student)
            .await
            .unwrap();
        let err = world
            .lifecycle
            .select_teacher(&request_id, &second, &student)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(world.kinds(&second).await.is_empty());
    }

    #[tokio::test]
    async fn test_one_live_match_per_request_is_enforced_by_storage() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let first = world.user("tono", "Informatics", 4, Some(5)).await;
        let second = world.user("wati", "Physics", 3, Some(4)).await;
        let request_id = world.open_request(&student).await;
        world
            .lifecycle
            .select_teacher(&request_id, &first, &student)
            .await
            .unwrap();

        // Bypass the status checks and write a second pending match directly.
        let mut tx = world.repo.pool().begin().await.unwrap();
        let duplicate = StudyMatch {
            id: queries::new_id(),
            request_id: request_id.clone(),
            teacher_id: second.clone(),
            student_id: student.clone(),
            status: MatchStatus::Pending,
            created_at: queries::now(),
        };
        let err = queries::insert_match(&mut tx, &duplicate).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        drop(tx);

        let matches = world.repo.list_request_matches(&request_id).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].teacher_id, first);
    }

    #[tokio::test]
    async fn test_write_on_stale_snapshot_conflicts() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let first = world.user("tono", "Informatics", 4, Some(5)).await;
        let second = world.user("wati", "Physics", 3, Some(4)).await;
        let request_id = world.open_request(&student).await;

        // A deferred transaction reads the request while it is still open.
        let mut stale = world.repo.pool().begin().await.unwrap();
        let seen = queries::fetch_request(&mut stale, &request_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen.status, RequestStatus::Open);

        world
            .lifecycle
            .select_teacher(&request_id, &first, &student)
            .await
            .unwrap();

        let err = ops::select_teacher(&mut stale, &request_id, &second, &student)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        drop(stale);

        assert_eq!(world.request_status(&request_id).await, RequestStatus::Pending);
        assert!(world.kinds(&second).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_responses_have_one_winner() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let teacher = world.user("tono", "Informatics", 4, Some(5)).await;

        for _ in 0..5 {
            let request_id = world.open_request(&student).await;
            world
                .lifecycle
                .select_teacher(&request_id, &teacher, &student)
                .await
                .unwrap();

            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let lifecycle = world.lifecycle.clone();
                    let request_id = request_id.clone();
                    let teacher = teacher.clone();
                    tokio::spawn(async move { lifecycle.respond(&request_id, &teacher, true).await })
                })
                .collect();

            let mut accepted = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(study_match) => {
                        assert_eq!(study_match.status, MatchStatus::Active);
                        accepted += 1;
                    }
                    Err(err) => assert!(matches!(err, AppError::Conflict(_)), "{}", err),
                }
            }
            assert_eq!(accepted, 1);
            assert_eq!(world.request_status(&request_id).await, RequestStatus::Active);
        }

        let accepted_notices = world
            .kinds(&student)
            .await
            .into_iter()
            .filter(|kind| *kind == NotificationKind::RequestAccepted)
            .count();
        assert_eq!(accepted_notices, 5);
    }

    #[tokio::test]
    async fn test_selection_preconditions() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, Some(2)).await;
        let stranger = world.user("budi", "Physics", 2, None).await;
        let teacher = world.user("tono", "Informatics", 4, Some(5)).await;
        let request_id = world.open_request(&student).await;

        let err = world
            .lifecycle
            .select_teacher(&request_id, &teacher, &stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = world
            .lifecycle
            .select_teacher(&request_id, &student, &student)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = world
            .lifecycle
            .select_teacher(&request_id, &stranger, &student)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(world.request_status(&request_id).await, RequestStatus::Open);
    }

    #[tokio::test]
    async fn test_only_targeted_teacher_may_respond() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let teacher = world.user("tono", "Informatics", 4, Some(5)).await;
        let other = world.user("wati", "Physics", 3, Some(4)).await;
        let request_id = world.open_request(&student).await;
        world
            .lifecycle
            .select_teacher(&request_id, &teacher, &student)
            .await
            .unwrap();

        let err = world.lifecycle.respond(&request_id, &other, true).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert_eq!(world.request_status(&request_id).await, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn test_failed_side_effect_rolls_back_transition() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let teacher = world.user("tono", "Informatics", 4, Some(5)).await;
        let request_id = world.open_request(&student).await;

        sqlx::query(
            "CREATE TRIGGER fail_notify BEFORE INSERT ON notifications BEGIN SELECT RAISE(ABORT, 'boom'); END;",
        )
        .execute(world.repo.pool())
        .await
        .unwrap();

        let err = world
            .lifecycle
            .select_teacher(&request_id, &teacher, &student)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));

        assert_eq!(world.request_status(&request_id).await, RequestStatus::Open);
        assert!(world.repo.list_request_matches(&request_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_pending_notifies_teacher_and_reopens() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let teacher = world.user("tono", "Informatics", 4, Some(5)).await;
        let request_id = world.open_request(&student).await;
        world
            .lifecycle
            .select_teacher(&request_id, &teacher, &student)
            .await
            .unwrap();

        let request = world.lifecycle.cancel_pending(&request_id, &student).await.unwrap();
        assert_eq!(request.status, RequestStatus::Open);
        assert!(world.repo.list_request_matches(&request_id).await.unwrap().is_empty());
        assert_eq!(world.kinds(&teacher).await[0], NotificationKind::RequestCancelled);

        let err = world
            .lifecycle
            .cancel_pending(&request_id, &student)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_cancel_active_by_either_side() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let teacher = world.user("tono", "Informatics", 4, Some(5)).await;
        let stranger = world.user("budi", "Physics", 2, None).await;
        let request_id = world.open_request(&student).await;
        let study_match = world
            .lifecycle
            .select_teacher(&request_id, &teacher, &student)
            .await
            .unwrap();
        world.lifecycle.respond(&request_id, &teacher, true).await.unwrap();

        let err = world
            .lifecycle
            .cancel_active(&study_match.id, &stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let cancelled = world
            .lifecycle
            .cancel_active(&study_match.id, &teacher)
            .await
            .unwrap();
        assert_eq!(cancelled.status, MatchStatus::Cancelled);
        assert_eq!(world.request_status(&request_id).await, RequestStatus::Cancelled);
        assert_eq!(world.kinds(&student).await[0], NotificationKind::MatchCancelled);
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let teacher = world.user("tono", "Informatics", 4, Some(5)).await;

        let pending_id = world.open_request(&student).await;
        world
            .lifecycle
            .select_teacher(&pending_id, &teacher, &student)
            .await
            .unwrap();

        let err = world
            .lifecycle
            .delete_request(&pending_id, &teacher)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        world.lifecycle.delete_request(&pending_id, &student).await.unwrap();
        assert!(world.repo.get_request(&pending_id).await.unwrap().is_none());
        assert!(world.repo.list_request_matches(&pending_id).await.unwrap().is_empty());
        assert_eq!(world.kinds(&teacher).await[0], NotificationKind::RequestCancelled);

        let active_id = world.open_request(&student).await;
        world
            .lifecycle
            .select_teacher(&active_id, &teacher, &student)
            .await
            .unwrap();
        world.lifecycle.respond(&active_id, &teacher, true).await.unwrap();
        let err = world
            .lifecycle
            .delete_request(&active_id, &student)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(world.request_status(&active_id).await, RequestStatus::Active);

        let err = world
            .lifecycle
            .delete_request("missing", &student)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_leave_bubble_cascade() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let teacher = world.user("tono", "Informatics", 4, Some(5)).await;
        let learner = world.user("dewi", "Physics", 2, None).await;

        let open_id = world.open_request(&student).await;
        let active_id = world.open_request(&student).await;
        world
            .lifecycle
            .select_teacher(&active_id, &teacher, &student)
            .await
            .unwrap();
        world.lifecycle.respond(&active_id, &teacher, true).await.unwrap();

        // A request of someone else that targets the same teacher.
        let theirs = world.open_request(&learner).await;
        world
            .lifecycle
            .select_teacher(&theirs, &teacher, &learner)
            .await
            .unwrap();

        let summary = world.lifecycle.leave_bubble(&student).await.unwrap();
        assert_eq!(summary.bubble_id, world.bubble_id);
        assert_eq!(summary.cancelled_requests, 2);
        assert_eq!(summary.cancelled_matches, 1);

        assert_eq!(world.request_status(&open_id).await, RequestStatus::Cancelled);
        assert_eq!(world.request_status(&active_id).await, RequestStatus::Cancelled);
        assert_eq!(world.request_status(&theirs).await, RequestStatus::Pending);
        assert_eq!(world.kinds(&teacher).await[0], NotificationKind::MatchCancelled);

        let user = world.repo.get_user(&student).await.unwrap().unwrap();
        assert!(user.current_bubble_id.is_none());

        let err = world.lifecycle.leave_bubble(&student).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_teacher_leaving_reopens_pending_requests() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let teacher = world.user("tono", "Informatics", 4, Some(5)).await;
        let request_id = world.open_request(&student).await;
        world
            .lifecycle
            .select_teacher(&request_id, &teacher, &student)
            .await
            .unwrap();

        let summary = world.lifecycle.leave_bubble(&teacher).await.unwrap();
        assert_eq!(summary.reopened_requests, 1);
        assert_eq!(summary.cancelled_matches, 1);
        assert_eq!(world.request_status(&request_id).await, RequestStatus::Open);
        assert_eq!(world.kinds(&student).await[0], NotificationKind::MatchCancelled);
    }

    #[tokio::test]
    async fn test_leave_bubble_leaves_other_bubbles_alone() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;
        let teacher = world
            .user_in(&world.other_bubble_id, "tono", "Informatics", 4, Some(5))
            .await;
        let request_id = world.open_request(&student).await;
        world
            .lifecycle
            .select_teacher(&request_id, &teacher, &student)
            .await
            .unwrap();

        // The match belongs to the student's bubble, not the one the teacher leaves.
        let summary = world.lifecycle.leave_bubble(&teacher).await.unwrap();
        assert_eq!(summary.bubble_id, world.other_bubble_id);
        assert_eq!(summary.cancelled_matches, 0);
        assert_eq!(world.request_status(&request_id).await, RequestStatus::Pending);

        // Rejoining does not revive what an earlier leave cancelled.
        world.lifecycle.leave_bubble(&student).await.unwrap();
        world.repo.join_bubble(&student, &world.bubble_id).await.unwrap();
        assert_eq!(world.request_status(&request_id).await, RequestStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_create_request_requires_membership() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, None).await;

        let err = world
            .lifecycle
            .create_request(
                &student,
                &CreateStudyRequest {
                    bubble_id: world.other_bubble_id.clone(),
                    skill_id: world.skill_id.clone(),
                    specific_topic: "Joins".to_string(),
                    learning_objectives: None,
                    preferred_schedule: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = world
            .lifecycle
            .create_request(
                &student,
                &CreateStudyRequest {
                    bubble_id: world.bubble_id.clone(),
                    skill_id: world.skill_id.clone(),
                    specific_topic: "   ".to_string(),
                    learning_objectives: None,
                    preferred_schedule: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_ranked_candidates() {
        let world = World::new().await;
        let student = world.user("sari", "Informatics", 1, Some(3)).await;
        let senior = world.user("tono", "Informatics", 4, Some(4)).await;
        let junior = world.user("wati", "Physics", 1, Some(2)).await;
        let _learner = world.user("dewi", "Physics", 2, None).await;
        let request_id = world.open_request(&student).await;

        let ranked = world
            .lifecycle
            .compute_ranked_candidates(&request_id)
            .await
            .unwrap();
        let ids: Vec<&str> = ranked.iter().map(|c| c.user_id.as_str()).collect();
        assert_eq!(ids, vec![senior.as_str(), junior.as_str()]);
        assert_eq!(ranked[0].score, 85);
        assert_eq!(ranked[1].score, 20);
        assert!(!ranked[0].has_request_pending);

        world
            .lifecycle
            .select_teacher(&request_id, &senior, &student)
            .await
            .unwrap();
        let ranked = world
            .lifecycle
            .compute_ranked_candidates(&request_id)
            .await
            .unwrap();
        assert!(ranked[0].has_request_pending);
        assert!(!ranked[1].has_request_pending);

        let err = world
            .lifecycle
            .compute_ranked_candidates("missing")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
