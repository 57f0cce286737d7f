//! Matches between a request and a teacher.

use serde::{Deserialize, Serialize};

use crate::lifecycle::{MatchStatus, RequestStatus};

/// The pairing of a request with one teacher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyMatch {
    pub id: String,
    pub request_id: String,
    pub teacher_id: String,
    pub student_id: String,
    pub status: MatchStatus,
    pub created_at: String,
}

impl StudyMatch {
    pub fn involves(&self, user_id: &str) -> bool {
        self.teacher_id == user_id || self.student_id == user_id
    }

    /// The participant on the other side from `user_id`.
    pub fn counterpart_of(&self, user_id: &str) -> &str {
        if self.teacher_id == user_id {
            &self.student_id
        } else {
            &self.teacher_id
        }
    }
}

/// Which side of the match a listing is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRole {
    Teaching,
    Learning,
}

impl MatchRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "teaching" => Some(MatchRole::Teaching),
            "learning" => Some(MatchRole::Learning),
            _ => None,
        }
    }
}

/// A match joined with its request, for the participant dashboards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchListing {
    pub match_id: String,
    pub match_status: MatchStatus,
    pub request_id: String,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_objectives: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_schedule: Option<String>,
    pub request_status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub skill_name: String,
    pub other_user: String,
    pub teacher_id: String,
    pub student_id: String,
}

/// Body of `POST /api/matches/{requestId}/accept`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectTeacherRequest {
    pub teacher_id: String,
}

/// Body of `POST /api/study-requests/{id}/respond`.
#[derive(Debug, Clone, Deserialize)]
pub struct RespondRequest {
    pub accepted: bool,
}

/// Body of `POST /api/matches/{id}/complete`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteMatchRequest {
    pub rating: i64,
    #[serde(default, alias = "comment")]
    pub feedback: Option<String>,
}
