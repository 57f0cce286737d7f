//! Ratings left when a match completes.

use serde::{Deserialize, Serialize};

/// Lowest rating a participant can give.
pub const MIN_RATING: i64 = 1;
/// Highest rating a participant can give.
pub const MAX_RATING: i64 = 5;

/// Feedback from one participant about the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRating {
    pub id: String,
    pub request_id: String,
    pub rater_id: String,
    pub rated_id: String,
    pub rating: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: String,
}
