//! Study requests posted by students.

use serde::{Deserialize, Serialize};

use crate::lifecycle::RequestStatus;

/// A student's ask for help with a skill inside a bubble.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyRequest {
    pub id: String,
    pub requester_id: String,
    pub bubble_id: String,
    pub skill_id: String,
    pub specific_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_objectives: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_schedule: Option<String>,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub created_at: String,
}

/// Request body for posting a study request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudyRequest {
    pub bubble_id: String,
    pub skill_id: String,
    pub specific_topic: String,
    #[serde(default)]
    pub learning_objectives: Option<String>,
    #[serde(default)]
    pub preferred_schedule: Option<String>,
}

impl CreateStudyRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.bubble_id.trim().is_empty() {
            return Err("Bubble is required".to_string());
        }
        if self.skill_id.trim().is_empty() {
            return Err("Skill is required".to_string());
        }
        if self.specific_topic.trim().is_empty() {
            return Err("Specific topic is required".to_string());
        }
        Ok(())
    }
}

/// A request as listed on its owner's dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyRequestListing {
    #[serde(flatten)]
    pub request: StudyRequest,
    pub skill_name: String,
    pub bubble_name: String,
}

/// An open request as listed inside a bubble.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BubbleRequestListing {
    #[serde(flatten)]
    pub request: StudyRequest,
    pub skill_name: String,
    pub requester_name: String,
    pub is_own_request: bool,
}
