//! Notification texts for lifecycle transitions.

use crate::models::{NewNotification, NotificationKind};

fn note(user_id: &str, kind: NotificationKind, message: &str) -> NewNotification {
    NewNotification {
        user_id: user_id.to_string(),
        message: message.to_string(),
        kind,
    }
}

pub fn new_request(teacher_id: &str) -> NewNotification {
    note(
        teacher_id,
        NotificationKind::NewRequest,
        "You have received a new study request",
    )
}

pub fn request_sent(student_id: &str) -> NewNotification {
    note(
        student_id,
        NotificationKind::RequestSent,
        "Your study request has been sent to the teacher",
    )
}

pub fn response(student_id: &str, accepted: bool) -> NewNotification {
    if accepted {
        note(
            student_id,
            NotificationKind::RequestAccepted,
            "Your study request has been accepted!",
        )
    } else {
        note(
            student_id,
            NotificationKind::RequestDeclined,
            "Your study request has been declined.",
        )
    }
}

/// Tells the targeted teacher that the student withdrew or deleted the request.
pub fn request_cancelled(teacher_id: &str) -> NewNotification {
    note(
        teacher_id,
        NotificationKind::RequestCancelled,
        "A study request has been cancelled by the student",
    )
}

pub fn match_cancelled(user_id: &str) -> NewNotification {
    note(
        user_id,
        NotificationKind::MatchCancelled,
        "Your study session has been cancelled by the other participant",
    )
}

/// Sent to the counterpart of a user who left the bubble.
pub fn participant_left(user_id: &str) -> NewNotification {
    note(
        user_id,
        NotificationKind::MatchCancelled,
        "Your study session was cancelled because the other participant left the bubble",
    )
}

pub fn match_completed(user_id: &str) -> NewNotification {
    note(
        user_id,
        NotificationKind::MatchCompleted,
        "Your study session has been marked as completed",
    )
}
