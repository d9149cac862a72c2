use chrono::{DateTime, Utc};
use hindsight_core::model::Suggestion;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Requests ---

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    /// "github" or "diff". Validated by hand so bad values come back as
    /// 400 rather than a body-rejection status.
    pub source: String,
    pub url: Option<String>,
    pub content: Option<String>,
    pub pr_number: Option<u64>,
    pub repo_owner: Option<String>,
    pub repo_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListReviewsParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub review_id: Uuid,
    pub suggestion_id: Uuid,
    /// "accept", "reject", or "edit".
    pub action: String,
    pub reason: Option<String>,
    pub edited_suggestion: Option<String>,
}

// --- Responses ---

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub review_id: Uuid,
    pub suggestions: Vec<Suggestion>,
    pub file_count: usize,
    pub total_changes: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub success: bool,
    pub message: String,
}
