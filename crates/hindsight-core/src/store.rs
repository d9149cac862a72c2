use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{FeedbackAction, FeedbackRecord};

/// A stored feedback document: the searchable code context plus its
/// structured record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFeedback {
    pub id: String,
    pub document: String,
    pub record: FeedbackRecord,
}

/// Exact-match filter over record fields. Every populated field must match.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFilter {
    pub review_id: Option<Uuid>,
    pub suggestion_id: Option<Uuid>,
    pub action: Option<FeedbackAction>,
}

impl RecordFilter {
    pub fn review(review_id: Uuid) -> Self {
        Self {
            review_id: Some(review_id),
            ..Self::default()
        }
    }

    pub fn suggestion(review_id: Uuid, suggestion_id: Uuid) -> Self {
        Self {
            review_id: Some(review_id),
            suggestion_id: Some(suggestion_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &FeedbackRecord) -> bool {
        self.review_id.is_none_or(|id| record.review_id == id)
            && self
                .suggestion_id
                .is_none_or(|id| record.suggestion_id == id)
            && self.action.is_none_or(|a| record.action == a)
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// `add` refuses to overwrite. Duplicate handling is an explicit
    /// policy here, never a backend accident.
    #[error("duplicate document id: {0}")]
    DuplicateId(String),
    #[error("record not found: {0}")]
    RecordNotFound(String),
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Persistence(e.to_string())
    }
}

/// Backend contract for the feedback corpus: exact-match metadata lookup
/// plus ranked textual similarity search. Any backend satisfying these
/// four operations (here, an in-memory cosine scan) can serve the
/// higher-level review memory.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Insert a new document. Fails with `DuplicateId` if `id` exists.
    async fn add(
        &self,
        id: &str,
        document: &str,
        record: FeedbackRecord,
    ) -> Result<(), StoreError>;

    /// All entries whose record matches every populated filter field.
    async fn get(&self, filter: &RecordFilter) -> Vec<StoredFeedback>;

    /// Up to `k` entries ranked by similarity of `text` to the stored
    /// document text. Callers post-filter; no action filtering happens here.
    async fn query_similar(&self, text: &str, k: usize) -> Vec<StoredFeedback>;

    /// Replace the record for an existing id.
    async fn update(&self, id: &str, record: FeedbackRecord) -> Result<(), StoreError>;

    /// Every entry in the store, in unspecified order.
    async fn all(&self) -> Vec<StoredFeedback>;
}
