//! Lifecycle operations over an open connection.
//!
//! Each function performs one transition with all its side effects on the connection it is
//! given. Callers own the transaction: they commit on `Ok` and drop (roll back) on `Err`, so an
//! operation never becomes visible half-applied. All preconditions are checked before the
//! first write, and every write is guarded by the status it expects to replace; a guard that
//! matches nothing means another caller got there first and is reported as `Conflict`.

use sqlx::SqliteConnection;

use super::notify;
use super::state::{MatchEvent, MatchStatus, RequestEvent, RequestStatus};
use crate::db::queries;
use crate::errors::AppError;
use crate::matching::{self, RankedCandidate, RequesterProfile};
use crate::models::{
    CreateStudyRequest, StudyMatch, StudyRequest, UserRating, MAX_RATING, MIN_RATING,
};

/// What `leave_bubble` touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveSummary {
    pub bubble_id: String,
    pub cancelled_requests: usize,
    pub cancelled_matches: usize,
    pub reopened_requests: usize,
}

fn lost_race(what: &str, id: &str) -> AppError {
    AppError::Conflict(format!("{} {} was changed by another action", what, id))
}

async fn load_request(
    conn: &mut SqliteConnection,
    request_id: &str,
) -> Result<StudyRequest, AppError> {
    queries::fetch_request(conn, request_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Study request {} not found", request_id)))
}

async fn load_owned_request(
    conn: &mut SqliteConnection,
    request_id: &str,
    requester_id: &str,
) -> Result<StudyRequest, AppError> {
    let request = load_request(conn, request_id).await?;
    if request.requester_id != requester_id {
        return Err(AppError::Unauthorized(
            "Only the requester can change this study request".to_string(),
        ));
    }
    Ok(request)
}

async fn load_participated_match(
    conn: &mut SqliteConnection,
    match_id: &str,
    actor_id: &str,
) -> Result<StudyMatch, AppError> {
    let study_match = queries::fetch_match(conn, match_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Match {} not found", match_id)))?;
    if !study_match.involves(actor_id) {
        return Err(AppError::Unauthorized(
            "Only the teacher or the student of a match can change it".to_string(),
        ));
    }
    Ok(study_match)
}

/// Write a transition already checked against the table, guarded on the prior status.
async fn move_request(
    conn: &mut SqliteConnection,
    request: &StudyRequest,
    next: RequestStatus,
) -> Result<(), AppError> {
    if !queries::update_request_status(conn, &request.id, request.status, next).await? {
        return Err(lost_race("Study request", &request.id));
    }
    Ok(())
}

async fn move_match(
    conn: &mut SqliteConnection,
    study_match: &StudyMatch,
    next: MatchStatus,
) -> Result<(), AppError> {
    if !queries::update_match_status(conn, &study_match.id, study_match.status, next).await? {
        return Err(lost_race("Match", &study_match.id));
    }
    Ok(())
}

/// Post a new open request in a bubble the requester belongs to.
pub async fn create_request(
    conn: &mut SqliteConnection,
    requester_id: &str,
    input: &CreateStudyRequest,
) -> Result<StudyRequest, AppError> {
    input.validate().map_err(AppError::Validation)?;

    let requester = queries::fetch_user(conn, requester_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", requester_id)))?;
    if !queries::bubble_exists(conn, &input.bubble_id).await? {
        return Err(AppError::NotFound(format!(
            "Bubble {} not found",
            input.bubble_id
        )));
    }
    if !queries::skill_exists(conn, &input.skill_id).await? {
        return Err(AppError::NotFound(format!(
            "Skill {} not found",
            input.skill_id
        )));
    }
    if requester.current_bubble_id.as_deref() != Some(input.bubble_id.as_str()) {
        return Err(AppError::Validation(
            "Join the bubble before posting a request in it".to_string(),
        ));
    }

    let request = StudyRequest {
        id: queries::new_id(),
        requester_id: requester_id.to_string(),
        bubble_id: input.bubble_id.clone(),
        skill_id: input.skill_id.clone(),
        specific_topic: input.specific_topic.trim().to_string(),
        learning_objectives: input.learning_objectives.clone(),
        preferred_schedule: input.preferred_schedule.clone(),
        status: RequestStatus::Open,
        feedback: None,
        created_at: queries::now(),
    };
    queries::insert_request(conn, &request).await?;

    tracing::info!(request_id = %request.id, requester_id, "Study request created");
    Ok(request)
}

/// Eligible teachers for a request, best match first.
pub async fn compute_ranked_candidates(
    conn: &mut SqliteConnection,
    request_id: &str,
) -> Result<Vec<RankedCandidate>, AppError> {
    let request = load_request(conn, request_id).await?;
    let requester = queries::fetch_user(conn, &request.requester_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Requester {} not found", request.requester_id))
        })?;

    let candidates =
        queries::fetch_candidates(conn, &request.id, &request.skill_id, &request.requester_id)
            .await?;
    let profile = RequesterProfile {
        department: requester.department,
        study_year: requester.study_year,
    };

    let ranked = matching::rank(candidates, &profile);
    tracing::debug!(request_id, candidates = ranked.len(), "Ranked candidates");
    Ok(ranked)
}

/// The requester sends an open request to one teacher.
pub async fn select_teacher(
    conn: &mut SqliteConnection,
    request_id: &str,
    teacher_id: &str,
    student_id: &str,
) -> Result<StudyMatch, AppError> {
    let request = load_owned_request(conn, request_id, student_id).await?;
    if teacher_id == student_id {
        return Err(AppError::Validation(
            "You cannot send a request to yourself".to_string(),
        ));
    }
    let next = request.status.next(RequestEvent::TeacherSelected)?;

    let teacher = queries::fetch_user(conn, teacher_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Teacher {} not found", teacher_id)))?;
    if queries::teaching_proficiency(conn, teacher_id, &request.skill_id)
        .await?
        .is_none()
    {
        return Err(AppError::Validation(format!(
            "{} does not teach the requested skill",
            teacher.username
        )));
    }
    if teacher.current_bubble_id.is_none() {
        return Err(AppError::Validation(format!(
            "{} is not in a bubble",
            teacher.username
        )));
    }

    move_request(conn, &request, next).await?;

    let study_match = StudyMatch {
        id: queries::new_id(),
        request_id: request.id.clone(),
        teacher_id: teacher_id.to_string(),
        student_id: student_id.to_string(),
        status: MatchStatus::Pending,
        created_at: queries::now(),
    };
    queries::insert_match(conn, &study_match).await?;

    queries::insert_notification(conn, &notify::new_request(teacher_id)).await?;
    queries::insert_notification(conn, &notify::request_sent(student_id)).await?;

    tracing::info!(
        request_id,
        match_id = %study_match.id,
        teacher_id,
        "Teacher selected for study request"
    );
    Ok(study_match)
}

/// The targeted teacher accepts or declines a pending request.
///
/// Accepting activates both the request and the match. Declining closes the match and
/// reopens the request so the student can pick someone else.
pub async fn respond(
    conn: &mut SqliteConnection,
    request_id: &str,
    teacher_id: &str,
    accepted: bool,
) -> Result<StudyMatch, AppError> {
    let request = load_request(conn, request_id).await?;

    let study_match = match queries::fetch_teacher_match(conn, request_id, teacher_id).await? {
        Some(study_match) => study_match,
        None if queries::fetch_live_match(conn, request_id).await?.is_some() => {
            return Err(AppError::Unauthorized(
                "This request was sent to another teacher".to_string(),
            ))
        }
        None => {
            return Err(AppError::NotFound(format!(
                "No request for you on study request {}",
                request_id
            )))
        }
    };

    if !study_match.status.is_live() {
        return Err(AppError::Conflict(format!(
            "Match {} is already {}",
            study_match.id, study_match.status
        )));
    }

    let (match_event, request_event) = if accepted {
        (MatchEvent::Accepted, RequestEvent::TeacherAccepted)
    } else {
        (MatchEvent::Declined, RequestEvent::TeacherDeclined)
    };
    let match_next = study_match.status.next(match_event)?;
    let request_next = request.status.next(request_event)?;

    move_request(conn, &request, request_next).await?;
    move_match(conn, &study_match, match_next).await?;

    queries::insert_notification(conn, &notify::response(&study_match.student_id, accepted))
        .await?;

    tracing::info!(
        request_id,
        match_id = %study_match.id,
        accepted,
        "Teacher responded to study request"
    );
    Ok(StudyMatch {
        status: match_next,
        ..study_match
    })
}

/// The requester withdraws a request before the teacher answered.
pub async fn cancel_pending(
    conn: &mut SqliteConnection,
    request_id: &str,
    requester_id: &str,
) -> Result<StudyRequest, AppError> {
    let request = load_owned_request(conn, request_id, requester_id).await?;
    let next = request.status.next(RequestEvent::PendingCancelled)?;

    let pending_match = queries::fetch_live_match(conn, request_id).await?;
    if let Some(study_match) = &pending_match {
        if study_match.status != MatchStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Match {} is already {}",
                study_match.id, study_match.status
            )));
        }
    }

    move_request(conn, &request, next).await?;
    if let Some(study_match) = &pending_match {
        if !queries::delete_match(conn, &study_match.id, MatchStatus::Pending).await? {
            return Err(lost_race("Match", &study_match.id));
        }
        queries::insert_notification(conn, &notify::request_cancelled(&study_match.teacher_id))
            .await?;
    }

    tracing::info!(request_id, "Pending study request withdrawn");
    Ok(StudyRequest {
        status: next,
        ..request
    })
}

/// Either participant calls off an active match.
pub async fn cancel_active(
    conn: &mut SqliteConnection,
    match_id: &str,
    actor_id: &str,
) -> Result<StudyMatch, AppError> {
    let study_match = load_participated_match(conn, match_id, actor_id).await?;
    let request = load_request(conn, &study_match.request_id).await?;
    let next = study_match.status.next(MatchEvent::Cancelled)?;
    let request_next = request.status.next(RequestEvent::MatchCancelled)?;

    move_match(conn, &study_match, next).await?;
    move_request(conn, &request, request_next).await?;

    let other = study_match.counterpart_of(actor_id);
    queries::insert_notification(conn, &notify::match_cancelled(other)).await?;

    tracing::info!(match_id, actor_id, "Match cancelled");
    Ok(StudyMatch {
        status: next,
        ..study_match
    })
}

/// Either participant marks an active match done and rates the other one.
pub async fn complete(
    conn: &mut SqliteConnection,
    match_id: &str,
    actor_id: &str,
    rating: i64,
    feedback: Option<&str>,
) -> Result<UserRating, AppError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::Validation(format!(
            "Rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )));
    }

    let study_match = load_participated_match(conn, match_id, actor_id).await?;
    let request = load_request(conn, &study_match.request_id).await?;
    let match_next = study_match.status.next(MatchEvent::Completed)?;
    let request_next = request.status.next(RequestEvent::MatchCompleted)?;

    move_match(conn, &study_match, match_next).await?;
    if !queries::complete_request(conn, &request.id, request.status, request_next, feedback)
        .await?
    {
        return Err(lost_race("Study request", &request.id));
    }

    let rated_id = study_match.counterpart_of(actor_id).to_string();
    let user_rating = UserRating {
        id: queries::new_id(),
        request_id: request.id.clone(),
        rater_id: actor_id.to_string(),
        rated_id,
        rating,
        comment: feedback.map(str::to_string),
        created_at: queries::now(),
    };
    queries::insert_rating(conn, &user_rating).await?;
    queries::insert_notification(conn, &notify::match_completed(&user_rating.rated_id)).await?;

    tracing::info!(match_id, actor_id, rating, "Match completed");
    Ok(user_rating)
}

/// Leave the current bubble, cancelling everything the user has going on inside it.
///
/// The user's own requests are cancelled together with their matches. Where the user is the
/// teacher, a pending request goes back to open for the student and an active one is
/// cancelled. Requests and matches in other bubbles are left alone.
pub async fn leave_bubble(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<LeaveSummary, AppError> {
    let user = queries::fetch_user(conn, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
    let bubble_id = user
        .current_bubble_id
        .ok_or_else(|| AppError::Conflict("You are not in a bubble".to_string()))?;

    let mut summary = LeaveSummary {
        bubble_id: bubble_id.clone(),
        ..LeaveSummary::default()
    };

    for study_match in queries::fetch_live_matches_in_bubble(conn, user_id, &bubble_id).await? {
        let next = study_match.status.next(MatchEvent::BubbleLeft)?;
        move_match(conn, &study_match, next).await?;
        summary.cancelled_matches += 1;

        if study_match.teacher_id == user_id {
            let request = load_request(conn, &study_match.request_id).await?;
            let request_next = request.status.next(RequestEvent::TeacherLeft)?;
            move_request(conn, &request, request_next).await?;
            match request_next {
                RequestStatus::Open => summary.reopened_requests += 1,
                _ => summary.cancelled_requests += 1,
            }
        }

        let other = study_match.counterpart_of(user_id);
        queries::insert_notification(conn, &notify::participant_left(other)).await?;
    }

    let requests = queries::fetch_requests_in_bubble(conn, user_id, &bubble_id).await?;
    for request in requests.into_iter().filter(|r| !r.status.is_terminal()) {
        let Ok(next) = request.status.next(RequestEvent::BubbleLeft) else {
            continue;
        };
        move_request(conn, &request, next).await?;
        summary.cancelled_requests += 1;
    }

    queries::set_current_bubble(conn, user_id, None).await?;

    tracing::info!(
        user_id,
        bubble_id = %summary.bubble_id,
        cancelled_requests = summary.cancelled_requests,
        cancelled_matches = summary.cancelled_matches,
        "User left bubble"
    );
    Ok(summary)
}

/// The requester deletes a request together with its matches and ratings.
///
/// Requests with an active match or a completed history cannot be deleted.
pub async fn delete_request(
    conn: &mut SqliteConnection,
    request_id: &str,
    requester_id: &str,
) -> Result<(), AppError> {
    let request = load_owned_request(conn, request_id, requester_id).await?;
    if !request.status.is_deletable() {
        return Err(AppError::Conflict(format!(
            "A {} study request cannot be deleted",
            request.status
        )));
    }

    let pending_teacher = queries::fetch_live_match(conn, request_id)
        .await?
        .filter(|m| m.status == MatchStatus::Pending)
        .map(|m| m.teacher_id);

    queries::delete_matches_for_request(conn, request_id).await?;
    queries::delete_ratings_for_request(conn, request_id).await?;
    if !queries::delete_request(conn, request_id, request.status).await? {
        return Err(lost_race("Study request", request_id));
    }

    if let Some(teacher_id) = pending_teacher {
        queries::insert_notification(conn, &notify::request_cancelled(&teacher_id)).await?;
    }

    tracing::info!(request_id, requester_id, "Study request deleted");
    Ok(())
}
