use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::diff::{FileChange, LineKind};
use crate::engine::{CompletionEngine, EngineError};
use crate::model::{FeedbackAction, SimilarFeedback, Suggestion};

/// At most this many accepted and this many rejected past suggestions are
/// quoted back to the model.
const MAX_GUIDANCE_ITEMS: usize = 3;

/// Generates review suggestions for one file's changes by prompting the
/// completion engine, conditioned on similar past feedback.
pub struct SuggestionGenerator {
    engine: Arc<dyn CompletionEngine>,
}

impl SuggestionGenerator {
    pub fn new(engine: Arc<dyn CompletionEngine>) -> Self {
        Self { engine }
    }

    /// Review a single file. Engine failures propagate (the caller decides
    /// what an unreachable model means); malformed model output does not —
    /// it degrades to no suggestions for this file so sibling files still
    /// get reviewed.
    pub async fn review_file(
        &self,
        file: &FileChange,
        similar_feedback: &[SimilarFeedback],
    ) -> Result<Vec<Suggestion>, EngineError> {
        let code_context = changed_lines_context(file);
        if code_context.is_empty() {
            // Binary blocks and context-only hunks leave nothing to ask about
            return Ok(Vec::new());
        }

        let prompt = build_prompt(&code_context, &file.path, similar_feedback);
        let response = self.engine.complete(&prompt).await?;
        Ok(parse_suggestions(&response, &file.path))
    }
}

/// Flatten a file change to its added/removed lines only, rendered as
/// `"<+|-> <line_no>: <text>"`. Line numbers prefer the new side, fall
/// back to the old side, and default to 0.
pub fn changed_lines_context(file: &FileChange) -> String {
    let mut lines = Vec::new();
    for hunk in &file.hunks {
        for line in &hunk.lines {
            let prefix = match line.kind {
                LineKind::Added => '+',
                LineKind::Removed => '-',
                LineKind::Context => continue,
            };
            let line_no = line.new_line_no.or(line.old_line_no).unwrap_or(0);
            lines.push(format!("{prefix} {line_no}: {}", line.content));
        }
    }
    lines.join("\n")
}

/// Compose the review prompt, injecting learned-preference guidance when
/// any judged feedback is available. With nothing accepted and nothing
/// rejected the section is omitted entirely rather than shown empty.
fn build_prompt(code_context: &str, file_path: &str, similar_feedback: &[SimilarFeedback]) -> String {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for feedback in similar_feedback {
        match feedback.action {
            FeedbackAction::Accept => accepted.push(format!("- {}", feedback.suggestion)),
            FeedbackAction::Reject => rejected.push(format!("- {}", feedback.suggestion)),
            _ => {}
        }
    }

    let mut learned = String::new();
    if !accepted.is_empty() || !rejected.is_empty() {
        learned.push_str("\n\n## Learned Preferences:\n");
        if !accepted.is_empty() {
            learned.push_str("User typically accepts:\n");
            learned.push_str(&accepted[..accepted.len().min(MAX_GUIDANCE_ITEMS)].join("\n"));
            learned.push('\n');
        }
        if !rejected.is_empty() {
            learned.push_str("User typically rejects:\n");
            learned.push_str(&rejected[..rejected.len().min(MAX_GUIDANCE_ITEMS)].join("\n"));
            learned.push('\n');
        }
    }

    format!(
        r#"You are an expert code reviewer. Analyze the following code changes and provide specific, actionable suggestions.

## File: {file_path}

## Code Changes:
```diff
{code_context}
```

## Review Guidelines:
1. Focus on: bugs, performance issues, security vulnerabilities, best practices, and code clarity
2. Be specific and actionable - suggest concrete improvements
3. Prioritize important issues over style nitpicks
4. Provide confidence scores (0-100) for each suggestion
5. Categorize suggestions: bug, performance, security, best_practice, readability, style{learned}

## Output Format (JSON array):
[
  {{
    "line_number": <int>,
    "end_line_number": <int or null>,
    "category": "<category>",
    "suggestion": "<detailed suggestion>",
    "confidence": <0-100>,
    "code_snippet": "<relevant code snippet>"
  }}
]

Provide only the JSON array, no additional text."#
    )
}

#[derive(Deserialize)]
struct RawSuggestion {
    #[serde(default)]
    line_number: u32,
    #[serde(default)]
    end_line_number: Option<u32>,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    suggestion: String,
    #[serde(default = "default_confidence")]
    confidence: u8,
    #[serde(default)]
    code_snippet: String,
}

fn default_category() -> String {
    crate::model::CATEGORY_BEST_PRACTICE.to_string()
}

fn default_confidence() -> u8 {
    50
}

/// Parse engine output into suggestions, tolerating markdown fences and
/// leading prose. Anything unparseable yields an empty list for this file.
fn parse_suggestions(response: &str, file_path: &str) -> Vec<Suggestion> {
    for candidate in extract_json_candidates(response) {
        if let Ok(raw) = serde_json::from_str::<Vec<RawSuggestion>>(&candidate) {
            return raw
                .into_iter()
                .map(|r| Suggestion {
                    id: Uuid::new_v4(),
                    line_number: r.line_number,
                    end_line_number: r.end_line_number,
                    file_path: file_path.to_string(),
                    category: r.category,
                    suggestion: r.suggestion,
                    // Models occasionally score outside the requested scale
                    confidence: r.confidence.min(100),
                    code_snippet: r.code_snippet,
                })
                .collect();
        }
    }

    warn!(
        file = %file_path,
        preview = response.chars().take(200).collect::<String>(),
        "could not parse model output as a suggestion array"
    );
    Vec::new()
}

/// Candidate JSON strings from a model response: the raw text, the span
/// between the outermost brackets, and the content of the first markdown
/// code fence.
fn extract_json_candidates(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    let mut candidates = vec![trimmed.to_string()];

    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) {
        if start < end {
            candidates.push(trimmed[start..=end].to_string());
        }
    }

    if let Some(fence_start) = trimmed.find("```") {
        let after = &trimmed[fence_start + 3..];
        // Drop a language tag like `json` on the fence line
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(fence_end) = body.find("```") {
            candidates.push(body[..fence_end].trim().to_string());
        }
    }

    candidates
}
