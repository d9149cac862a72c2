use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::model::{
    FeedbackAction, FeedbackRecord, FileSuggestions, ReviewSummary, SimilarFeedback, Suggestion,
    SuggestionSummary,
};
use crate::store::{FeedbackStore, RecordFilter, StoreError};

/// Over-fetch cap for similarity queries.
const MAX_SIMILAR_FETCH: usize = 20;

/// Learned-feedback memory over a `FeedbackStore` backend.
///
/// This is the layer that closes the loop: review sessions write pending
/// records here, human feedback mutates them, and later generations query
/// them back by code similarity.
#[derive(Clone)]
pub struct ReviewMemory {
    store: Arc<dyn FeedbackStore>,
}

impl ReviewMemory {
    pub fn new(store: Arc<dyn FeedbackStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn FeedbackStore> {
        &self.store
    }

    /// Past feedback whose code context resembles `code_context`.
    ///
    /// Over-fetches from the similarity query and keeps only records a
    /// human has actually judged; a pending record carries no signal and
    /// must never steer a prompt.
    pub async fn find_similar_feedback(
        &self,
        code_context: &str,
        limit: usize,
    ) -> Vec<SimilarFeedback> {
        let fetch = (limit * 3).min(MAX_SIMILAR_FETCH);
        let candidates = self.store.query_similar(code_context, fetch).await;

        let mut similar = Vec::new();
        for entry in candidates {
            if !entry.record.action.is_terminal() {
                continue;
            }
            similar.push(SimilarFeedback {
                code_context: entry.document,
                suggestion: entry.record.suggestion,
                action: entry.record.action,
                reason: entry.record.reason,
                category: entry.record.category,
                confidence: entry.record.confidence,
            });
            if similar.len() >= limit {
                break;
            }
        }
        similar
    }

    /// Persist one pending record per suggestion, keyed by
    /// `"{review_id}_{file_path}_{suggestion_id}"`.
    pub async fn record_suggestions(
        &self,
        review_id: Uuid,
        file_path: &str,
        code_context: &str,
        suggestions: &[Suggestion],
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        for suggestion in suggestions {
            let doc_id = format!("{review_id}_{file_path}_{}", suggestion.id);
            let record = FeedbackRecord {
                review_id,
                file_path: file_path.to_string(),
                suggestion_id: suggestion.id,
                suggestion: suggestion.suggestion.clone(),
                edited_suggestion: None,
                category: suggestion.category.clone(),
                confidence: suggestion.confidence,
                line_number: suggestion.line_number,
                action: FeedbackAction::Pending,
                reason: None,
                created_at: now,
                feedback_at: None,
            };
            self.store.add(&doc_id, code_context, record).await?;
        }
        Ok(())
    }

    /// Apply human feedback to a stored suggestion.
    ///
    /// Feedback on an unknown (review, suggestion) pair is a logged no-op:
    /// a stale browser tab must not turn into a user-facing failure.
    /// Repeat feedback on the same pair is last-write-wins.
    pub async fn apply_feedback(
        &self,
        review_id: Uuid,
        suggestion_id: Uuid,
        action: FeedbackAction,
        reason: Option<String>,
        edited_suggestion: Option<String>,
    ) -> Result<(), StoreError> {
        let matches = self
            .store
            .get(&RecordFilter::suggestion(review_id, suggestion_id))
            .await;

        let Some(entry) = matches.into_iter().next() else {
            warn!(%review_id, %suggestion_id, "feedback for unknown suggestion, ignoring");
            return Ok(());
        };

        let mut record = entry.record;
        record.action = action;
        record.reason = reason;
        record.feedback_at = Some(Utc::now());
        if let Some(edited) = edited_suggestion {
            record.suggestion = edited.clone();
            record.edited_suggestion = Some(edited);
        }

        self.store.update(&entry.id, record).await
    }

    /// Reconstruct a review session from its records; `None` if the id is
    /// unknown.
    pub async fn review_summary(&self, review_id: Uuid) -> Option<ReviewSummary> {
        let entries = self.store.get(&RecordFilter::review(review_id)).await;
        if entries.is_empty() {
            return None;
        }

        let suggestion_count = entries.len();
        let created_at = entries
            .iter()
            .map(|e| e.record.created_at)
            .min()
            .unwrap_or_else(Utc::now);

        let mut by_file: BTreeMap<String, Vec<SuggestionSummary>> = BTreeMap::new();
        for entry in entries {
            let record = entry.record;
            by_file
                .entry(record.file_path.clone())
                .or_default()
                .push(SuggestionSummary {
                    id: record.suggestion_id,
                    line_number: record.line_number,
                    category: record.category,
                    suggestion: record.suggestion,
                    confidence: record.confidence,
                    action: record.action,
                });
        }

        let files = by_file
            .into_iter()
            .map(|(file_path, suggestions)| FileSuggestions {
                file_path,
                suggestions,
            })
            .collect();

        Some(ReviewSummary {
            review_id,
            files,
            created_at,
            suggestion_count,
        })
    }

    /// Summaries of the most recent reviews, newest first.
    pub async fn recent_reviews(&self, limit: usize) -> Vec<ReviewSummary> {
        let entries = self.store.all().await;
        let mut review_ids: Vec<Uuid> = Vec::new();
        for entry in &entries {
            if !review_ids.contains(&entry.record.review_id) {
                review_ids.push(entry.record.review_id);
            }
        }

        let mut summaries = Vec::new();
        for review_id in review_ids {
            if let Some(summary) = self.review_summary(review_id).await {
                summaries.push(summary);
            }
        }

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries.truncate(limit);
        summaries
    }
}
