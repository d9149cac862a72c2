use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::FeedbackAction;
use crate::store::{FeedbackStore, StoredFeedback};

/// Width of one confidence histogram bucket.
const CONFIDENCE_BUCKET: u8 = 20;

/// Size of the recent-activity feed.
const RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryCounts {
    pub accept: u32,
    pub reject: u32,
    pub edit: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfidenceCounts {
    pub accept: u32,
    pub reject: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentPattern {
    pub category: String,
    pub action: FeedbackAction,
    pub confidence: u8,
    pub timestamp: DateTime<Utc>,
}

/// Learning analytics derived from judged feedback.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    pub total_feedback: u32,
    /// Percentage, rounded to two decimals.
    pub acceptance_rate: f64,
    pub accepts: u32,
    pub rejects: u32,
    pub edits: u32,
    pub by_category: HashMap<String, CategoryCounts>,
    pub by_confidence: HashMap<String, ConfidenceCounts>,
    pub recent_patterns: Vec<RecentPattern>,
}

/// Compute statistics over every judged record in the store. An empty or
/// all-pending corpus yields the zeroed structure, never an error.
pub async fn statistics(store: &dyn FeedbackStore) -> Statistics {
    let judged: Vec<StoredFeedback> = store
        .all()
        .await
        .into_iter()
        .filter(|e| e.record.action.is_terminal())
        .collect();

    if judged.is_empty() {
        return Statistics::default();
    }

    let mut stats = Statistics {
        total_feedback: judged.len() as u32,
        ..Statistics::default()
    };

    for entry in &judged {
        let record = &entry.record;
        let category = stats
            .by_category
            .entry(record.category.clone())
            .or_default();

        match record.action {
            FeedbackAction::Accept => {
                stats.accepts += 1;
                category.accept += 1;
            }
            FeedbackAction::Reject => {
                stats.rejects += 1;
                category.reject += 1;
            }
            FeedbackAction::Edit => {
                stats.edits += 1;
                category.edit += 1;
            }
            FeedbackAction::Pending => unreachable!("pending records are filtered out"),
        }

        // Edits are excluded from the confidence histogram: an edited
        // suggestion was neither taken as-is nor dismissed
        if matches!(record.action, FeedbackAction::Accept | FeedbackAction::Reject) {
            let bucket = confidence_bucket(record.confidence);
            let counts = stats.by_confidence.entry(bucket).or_default();
            match record.action {
                FeedbackAction::Accept => counts.accept += 1,
                FeedbackAction::Reject => counts.reject += 1,
                _ => {}
            }
        }
    }

    let rate = f64::from(stats.accepts) / f64::from(stats.total_feedback) * 100.0;
    stats.acceptance_rate = (rate * 100.0).round() / 100.0;

    let mut recent: Vec<&StoredFeedback> = judged.iter().collect();
    recent.sort_by_key(|e| std::cmp::Reverse(e.record.feedback_at.unwrap_or(e.record.created_at)));
    stats.recent_patterns = recent
        .into_iter()
        .take(RECENT_LIMIT)
        .map(|e| RecentPattern {
            category: e.record.category.clone(),
            action: e.record.action,
            confidence: e.record.confidence,
            timestamp: e.record.feedback_at.unwrap_or(e.record.created_at),
        })
        .collect();

    stats
}

fn confidence_bucket(confidence: u8) -> String {
    // u16 so the top bucket cannot overflow for out-of-scale records
    let width = u16::from(CONFIDENCE_BUCKET);
    let low = u16::from(confidence) / width * width;
    format!("{}-{}", low, low + width - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_store::JsonFileStore;
    use crate::memory::ReviewMemory;
    use crate::model::Suggestion;
    use std::sync::Arc;
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn seeded_memory() -> (ReviewMemory, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("feedback.json"))
            .await
            .unwrap();
        (ReviewMemory::new(Arc::new(store)), dir)
    }

    fn suggestion(category: &str, confidence: u8) -> Suggestion {
        Suggestion {
            id: Uuid::new_v4(),
            line_number: 1,
            end_line_number: None,
            file_path: "a.py".into(),
            category: category.into(),
            suggestion: "do the thing".into(),
            confidence,
            code_snippet: String::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_store_zeroed() {
        let (memory, _dir) = seeded_memory().await;
        let stats = statistics(memory.store().as_ref()).await;
        assert_eq!(stats.total_feedback, 0);
        assert_eq!(stats.acceptance_rate, 0.0);
        assert!(stats.by_category.is_empty());
        assert!(stats.by_confidence.is_empty());
        assert!(stats.recent_patterns.is_empty());
    }

    #[tokio::test]
    async fn test_pending_only_store_zeroed() {
        let (memory, _dir) = seeded_memory().await;
        memory
            .record_suggestions(Uuid::new_v4(), "a.py", "ctx", &[suggestion("style", 80)])
            .await
            .unwrap();
        let stats = statistics(memory.store().as_ref()).await;
        assert_eq!(stats.total_feedback, 0);
    }

    #[tokio::test]
    async fn test_counts_and_rate() {
        let (memory, _dir) = seeded_memory().await;
        let review_id = Uuid::new_v4();
        let s1 = suggestion("style", 85);
        let s2 = suggestion("style", 45);
        let s3 = suggestion("bug", 90);
        let s4 = suggestion("bug", 70);
        memory
            .record_suggestions(
                review_id,
                "a.py",
                "ctx",
                &[s1.clone(), s2.clone(), s3.clone(), s4.clone()],
            )
            .await
            .unwrap();
        memory
            .apply_feedback(review_id, s1.id, FeedbackAction::Accept, None, None)
            .await
            .unwrap();
        memory
            .apply_feedback(review_id, s2.id, FeedbackAction::Reject, None, None)
            .await
            .unwrap();
        memory
            .apply_feedback(review_id, s3.id, FeedbackAction::Accept, None, None)
            .await
            .unwrap();
        memory
            .apply_feedback(review_id, s4.id, FeedbackAction::Edit, None, Some("better".into()))
            .await
            .unwrap();

        let stats = statistics(memory.store().as_ref()).await;
        assert_eq!(stats.total_feedback, 4);
        assert_eq!(stats.accepts, 2);
        assert_eq!(stats.rejects, 1);
        assert_eq!(stats.edits, 1);
        assert_eq!(stats.acceptance_rate, 50.0);

        let style = &stats.by_category["style"];
        assert_eq!(style.accept, 1);
        assert_eq!(style.reject, 1);
        let bug = &stats.by_category["bug"];
        assert_eq!(bug.accept, 1);
        assert_eq!(bug.edit, 1);
    }

    #[tokio::test]
    async fn test_confidence_buckets() {
        let (memory, _dir) = seeded_memory().await;
        let review_id = Uuid::new_v4();
        let s1 = suggestion("style", 85);
        let s2 = suggestion("style", 45);
        let s3 = suggestion("style", 100);
        memory
            .record_suggestions(review_id, "a.py", "ctx", &[s1.clone(), s2.clone(), s3.clone()])
            .await
            .unwrap();
        memory
            .apply_feedback(review_id, s1.id, FeedbackAction::Accept, None, None)
            .await
            .unwrap();
        memory
            .apply_feedback(review_id, s2.id, FeedbackAction::Reject, None, None)
            .await
            .unwrap();
        memory
            .apply_feedback(review_id, s3.id, FeedbackAction::Accept, None, None)
            .await
            .unwrap();

        let stats = statistics(memory.store().as_ref()).await;
        assert_eq!(stats.by_confidence["80-99"].accept, 1);
        assert_eq!(stats.by_confidence["40-59"].reject, 1);
        assert_eq!(stats.by_confidence["100-119"].accept, 1);
    }

    #[test]
    fn test_confidence_bucket_out_of_scale() {
        // The generator clamps to 100, but old records might not be
        assert_eq!(confidence_bucket(250), "240-259");
        assert_eq!(confidence_bucket(255), "240-259");
        assert_eq!(confidence_bucket(0), "0-19");
    }

    #[tokio::test]
    async fn test_rate_rounding() {
        let (memory, _dir) = seeded_memory().await;
        let review_id = Uuid::new_v4();
        let suggestions: Vec<Suggestion> = (0..3).map(|_| suggestion("style", 50)).collect();
        memory
            .record_suggestions(review_id, "a.py", "ctx", &suggestions)
            .await
            .unwrap();
        memory
            .apply_feedback(review_id, suggestions[0].id, FeedbackAction::Accept, None, None)
            .await
            .unwrap();
        memory
            .apply_feedback(review_id, suggestions[1].id, FeedbackAction::Reject, None, None)
            .await
            .unwrap();
        memory
            .apply_feedback(review_id, suggestions[2].id, FeedbackAction::Reject, None, None)
            .await
            .unwrap();

        let stats = statistics(memory.store().as_ref()).await;
        // 1/3 = 33.333... rounds to 33.33
        assert_eq!(stats.acceptance_rate, 33.33);
    }

    #[tokio::test]
    async fn test_recent_patterns_capped_and_sorted() {
        let (memory, _dir) = seeded_memory().await;
        let review_id = Uuid::new_v4();
        let suggestions: Vec<Suggestion> = (0..12).map(|_| suggestion("style", 50)).collect();
        memory
            .record_suggestions(review_id, "a.py", "ctx", &suggestions)
            .await
            .unwrap();
        for s in &suggestions {
            memory
                .apply_feedback(review_id, s.id, FeedbackAction::Accept, None, None)
                .await
                .unwrap();
        }

        let stats = statistics(memory.store().as_ref()).await;
        assert_eq!(stats.recent_patterns.len(), 10);
        for pair in stats.recent_patterns.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }
}
