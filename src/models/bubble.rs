//! Bubbles and the skill catalog.

use serde::{Deserialize, Serialize};

/// A topical group users join.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bubble {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: String,
}

/// Request body for creating a bubble.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBubbleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// All bubbles plus the one the caller is currently in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BubblesOverview {
    pub bubbles: Vec<Bubble>,
    pub current_bubble: Option<Bubble>,
}

/// A teachable skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bubble_id: Option<String>,
}

/// Request body for adding a skill to the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSkillRequest {
    pub name: String,
    #[serde(default)]
    pub bubble_id: Option<String>,
}
