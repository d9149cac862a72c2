use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single generated review comment.
///
/// The category is an open set: the six well-known values below are what
/// the generator asks for, but unknown values coming back from the model
/// are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: Uuid,
    pub line_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line_number: Option<u32>,
    pub file_path: String,
    pub category: String,
    pub suggestion: String,
    pub confidence: u8,
    pub code_snippet: String,
}

pub const CATEGORY_BUG: &str = "bug";
pub const CATEGORY_BEST_PRACTICE: &str = "best_practice";

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackAction {
    Pending,
    Accept,
    Reject,
    Edit,
}

impl FeedbackAction {
    /// Pending records carry no learned signal; everything else does.
    pub fn is_terminal(self) -> bool {
        !matches!(self, FeedbackAction::Pending)
    }
}

/// The persisted, mutable counterpart of a `Suggestion`.
///
/// Created in `Pending` state when a review session is stored. A later
/// feedback submission moves it to a terminal action; repeat submissions
/// for the same suggestion are last-write-wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub review_id: Uuid,
    pub file_path: String,
    pub suggestion_id: Uuid,
    pub suggestion: String,
    /// Retains the human override when the action is `Edit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_suggestion: Option<String>,
    pub category: String,
    pub confidence: u8,
    pub line_number: u32,
    pub action: FeedbackAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_at: Option<DateTime<Utc>>,
}

/// A judged past suggestion retrieved for prompt conditioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimilarFeedback {
    pub code_context: String,
    pub suggestion: String,
    pub action: FeedbackAction,
    pub reason: Option<String>,
    pub category: String,
    pub confidence: u8,
}

/// Suggestions for one file within a review summary.
#[derive(Debug, Clone, Serialize)]
pub struct FileSuggestions {
    pub file_path: String,
    pub suggestions: Vec<SuggestionSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestionSummary {
    pub id: Uuid,
    pub line_number: u32,
    pub category: String,
    pub suggestion: String,
    pub confidence: u8,
    pub action: FeedbackAction,
}

/// A review session, reconstructed on demand from its feedback records.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewSummary {
    pub review_id: Uuid,
    pub files: Vec<FileSuggestions>,
    pub created_at: DateTime<Utc>,
    pub suggestion_count: usize,
}
