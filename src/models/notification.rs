//! Notifications produced by lifecycle transitions.

use serde::{Deserialize, Serialize};

/// Category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewRequest,
    RequestSent,
    RequestAccepted,
    RequestDeclined,
    RequestCancelled,
    MatchCancelled,
    MatchCompleted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewRequest => "new_request",
            NotificationKind::RequestSent => "request_sent",
            NotificationKind::RequestAccepted => "request_accepted",
            NotificationKind::RequestDeclined => "request_declined",
            NotificationKind::RequestCancelled => "request_cancelled",
            NotificationKind::MatchCancelled => "match_cancelled",
            NotificationKind::MatchCompleted => "match_completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new_request" => Some(NotificationKind::NewRequest),
            "request_sent" => Some(NotificationKind::RequestSent),
            "request_accepted" => Some(NotificationKind::RequestAccepted),
            "request_declined" => Some(NotificationKind::RequestDeclined),
            "request_cancelled" => Some(NotificationKind::RequestCancelled),
            "match_cancelled" => Some(NotificationKind::MatchCancelled),
            "match_completed" => Some(NotificationKind::MatchCompleted),
            _ => None,
        }
    }
}

/// A message for one user. Append-only apart from the read flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: String,
}

/// A notification waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: String,
    pub message: String,
    pub kind: NotificationKind,
}
