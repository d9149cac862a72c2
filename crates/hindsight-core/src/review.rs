use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::diff::ParsedDiff;
use crate::engine::{CompletionEngine, EngineError};
use crate::generator::{changed_lines_context, SuggestionGenerator};
use crate::memory::ReviewMemory;
use crate::model::{ReviewSummary, Suggestion};
use crate::store::StoreError;

/// How many judged past suggestions to retrieve per file.
const SIMILAR_FEEDBACK_LIMIT: usize = 3;

/// Coordinates per-file suggestion generation, confidence filtering, and
/// session persistence. Stateless apart from the injected collaborators;
/// one instance serves all requests.
#[derive(Clone)]
pub struct ReviewService {
    generator: Arc<SuggestionGenerator>,
    memory: ReviewMemory,
    min_confidence: u8,
}

impl ReviewService {
    pub fn new(engine: Arc<dyn CompletionEngine>, memory: ReviewMemory, min_confidence: u8) -> Self {
        Self {
            generator: Arc::new(SuggestionGenerator::new(engine)),
            memory,
            min_confidence,
        }
    }

    /// Generate suggestions for every file in the diff, dropping any below
    /// the minimum confidence. Files are reviewed one at a time; each
    /// file's generation is conditioned on feedback similar to that file's
    /// changed lines.
    pub async fn generate_review(
        &self,
        diff: &ParsedDiff,
        review_id: Uuid,
    ) -> Result<Vec<Suggestion>, EngineError> {
        let mut all_suggestions = Vec::new();

        for file in &diff.files {
            let code_context = changed_lines_context(file);
            let similar = self
                .memory
                .find_similar_feedback(&code_context, SIMILAR_FEEDBACK_LIMIT)
                .await;
            let suggestions = self.generator.review_file(file, &similar).await?;
            info!(
                %review_id,
                file = %file.path,
                count = suggestions.len(),
                "reviewed file"
            );
            all_suggestions.extend(suggestions);
        }

        all_suggestions.retain(|s| s.confidence >= self.min_confidence);
        Ok(all_suggestions)
    }

    /// Persist every suggestion of a completed session as pending feedback
    /// records, grouped with their file's changed-line context. Called
    /// only after generation fully returns, so a timed-out engine call
    /// never leaves a half-written session.
    pub async fn store_review_session(
        &self,
        review_id: Uuid,
        diff: &ParsedDiff,
        suggestions: &[Suggestion],
    ) -> Result<(), StoreError> {
        for file in &diff.files {
            let file_suggestions: Vec<Suggestion> = suggestions
                .iter()
                .filter(|s| s.file_path == file.path)
                .cloned()
                .collect();
            if file_suggestions.is_empty() {
                continue;
            }
            let code_context = changed_lines_context(file);
            self.memory
                .record_suggestions(review_id, &file.path, &code_context, &file_suggestions)
                .await?;
        }
        Ok(())
    }

    pub async fn get_review(&self, review_id: Uuid) -> Option<ReviewSummary> {
        self.memory.review_summary(review_id).await
    }

    pub async fn recent_reviews(&self, limit: usize) -> Vec<ReviewSummary> {
        self.memory.recent_reviews(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_store::JsonFileStore;
    use crate::parser::parse_diff;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Engine stub with a per-file script, matched on the `## File:` line
    /// of the prompt.
    struct PerFileEngine {
        responses: HashMap<String, String>,
    }

    #[async_trait]
    impl CompletionEngine for PerFileEngine {
        async fn complete(&self, prompt: &str) -> Result<String, EngineError> {
            for (file, response) in &self.responses {
                if prompt.contains(&format!("## File: {file}")) {
                    return Ok(response.clone());
                }
            }
            Ok("[]".to_string())
        }
    }

    async fn service_with(
        responses: HashMap<String, String>,
        min_confidence: u8,
    ) -> (ReviewService, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("feedback.json"))
            .await
            .unwrap();
        let memory = ReviewMemory::new(Arc::new(store));
        let engine = Arc::new(PerFileEngine { responses });
        (ReviewService::new(engine, memory, min_confidence), dir)
    }

    fn two_file_diff() -> ParsedDiff {
        parse_diff(
            "\
diff --git a/a.py b/a.py
--- a/a.py
+++ b/a.py
@@ -9,1 +9,2 @@
 import sys
+print(\"hi\")
diff --git a/b.py b/b.py
--- a/b.py
+++ b/b.py
@@ -1,1 +1,2 @@
 import os
+x = eval(raw)
",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_review_single_added_line() {
        let mut responses = HashMap::new();
        responses.insert(
            "a.py".to_string(),
            r#"[{"line_number":10,"category":"style","suggestion":"use f-string","confidence":80,"code_snippet":"print(\"hi\")"}]"#.to_string(),
        );
        let (service, _dir) = service_with(responses, 30).await;

        let diff = parse_diff(
            "\
diff --git a/a.py b/a.py
--- a/a.py
+++ b/a.py
@@ -9,1 +9,2 @@
 import sys
+print(\"hi\")
",
        )
        .unwrap();

        let suggestions = service
            .generate_review(&diff, Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].file_path, "a.py");
        assert_eq!(suggestions[0].line_number, 10);
        assert_eq!(suggestions[0].confidence, 80);
        assert_eq!(suggestions[0].category, "style");
    }

    #[tokio::test]
    async fn test_generate_review_filters_low_confidence() {
        let mut responses = HashMap::new();
        responses.insert(
            "a.py".to_string(),
            r#"[{"line_number":10,"confidence":80,"suggestion":"keep me"},
                {"line_number":10,"confidence":20,"suggestion":"drop me"}]"#
                .to_string(),
        );
        let (service, _dir) = service_with(responses, 30).await;
        let diff = two_file_diff();

        let suggestions = service
            .generate_review(&diff, Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].suggestion, "keep me");
    }

    #[tokio::test]
    async fn test_malformed_output_isolated_per_file() {
        let mut responses = HashMap::new();
        responses.insert("a.py".to_string(), "no json here at all".to_string());
        responses.insert(
            "b.py".to_string(),
            r#"[{"line_number":2,"category":"security","suggestion":"avoid eval","confidence":95}]"#
                .to_string(),
        );
        let (service, _dir) = service_with(responses, 30).await;

        let suggestions = service
            .generate_review(&two_file_diff(), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].file_path, "b.py");
    }

    #[tokio::test]
    async fn test_engine_failure_propagates() {
        struct FailingEngine;

        #[async_trait]
        impl CompletionEngine for FailingEngine {
            async fn complete(&self, _prompt: &str) -> Result<String, EngineError> {
                Err(EngineError::Unreachable("connection refused".into()))
            }
        }

        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("feedback.json"))
            .await
            .unwrap();
        let memory = ReviewMemory::new(Arc::new(store));
        let service = ReviewService::new(Arc::new(FailingEngine), memory, 30);

        let result = service
            .generate_review(&two_file_diff(), Uuid::new_v4())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_store_and_fetch_review_session() {
        let mut responses = HashMap::new();
        responses.insert(
            "a.py".to_string(),
            r#"[{"line_number":10,"suggestion":"one","confidence":70}]"#.to_string(),
        );
        responses.insert(
            "b.py".to_string(),
            r#"[{"line_number":2,"suggestion":"two","confidence":90}]"#.to_string(),
        );
        let (service, _dir) = service_with(responses, 30).await;
        let diff = two_file_diff();
        let review_id = Uuid::new_v4();

        let suggestions = service.generate_review(&diff, review_id).await.unwrap();
        service
            .store_review_session(review_id, &diff, &suggestions)
            .await
            .unwrap();

        let summary = service.get_review(review_id).await.unwrap();
        assert_eq!(summary.suggestion_count, 2);
        assert_eq!(summary.files.len(), 2);

        let recent = service.recent_reviews(10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].review_id, review_id);
    }
}
