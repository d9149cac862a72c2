use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::model::FeedbackRecord;
use crate::store::{FeedbackStore, RecordFilter, StoreError, StoredFeedback};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    document: String,
    record: FeedbackRecord,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct State {
    entries: BTreeMap<String, Entry>,
}

/// File-backed feedback store with a brute-force cosine-similarity scan.
///
/// The whole corpus lives in memory behind a mutex and is rewritten to
/// disk (write-temp-then-rename) after every mutation. Linear similarity
/// search is deliberate: the corpus is one team's review feedback, not a
/// web-scale index.
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<State>,
}

impl JsonFileStore {
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(data) => serde_json::from_str(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => State::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    async fn persist(&self, state: &State) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        let data = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl FeedbackStore for JsonFileStore {
    async fn add(
        &self,
        id: &str,
        document: &str,
        record: FeedbackRecord,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.entries.contains_key(id) {
            return Err(StoreError::DuplicateId(id.to_string()));
        }
        state.entries.insert(
            id.to_string(),
            Entry {
                document: document.to_string(),
                record,
            },
        );
        self.persist(&state).await?;
        Ok(())
    }

    async fn get(&self, filter: &RecordFilter) -> Vec<StoredFeedback> {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .filter(|(_, e)| filter.matches(&e.record))
            .map(|(id, e)| StoredFeedback {
                id: id.clone(),
                document: e.document.clone(),
                record: e.record.clone(),
            })
            .collect()
    }

    async fn query_similar(&self, text: &str, k: usize) -> Vec<StoredFeedback> {
        let state = self.state.lock().await;
        let query = term_frequencies(text);

        let mut scored: Vec<(f64, StoredFeedback)> = state
            .entries
            .iter()
            .map(|(id, e)| {
                let score = cosine_similarity(&query, &term_frequencies(&e.document));
                (
                    score,
                    StoredFeedback {
                        id: id.clone(),
                        document: e.document.clone(),
                        record: e.record.clone(),
                    },
                )
            })
            .collect();

        // Highest similarity first; ties broken by id for determinism
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });

        scored.into_iter().take(k).map(|(_, e)| e).collect()
    }

    async fn update(&self, id: &str, record: FeedbackRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let entry = state
            .entries
            .get_mut(id)
            .ok_or_else(|| StoreError::RecordNotFound(id.to_string()))?;
        entry.record = record;
        self.persist(&state).await?;
        Ok(())
    }

    async fn all(&self) -> Vec<StoredFeedback> {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .map(|(id, e)| StoredFeedback {
                id: id.clone(),
                document: e.document.clone(),
                record: e.record.clone(),
            })
            .collect()
    }
}

/// Lowercased alphanumeric token counts.
fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut counts = HashMap::new();
    for token in text
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
    {
        *counts.entry(token.to_lowercase()).or_insert(0.0) += 1.0;
    }
    counts
}

fn cosine_similarity(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .filter_map(|(term, wa)| b.get(term).map(|wb| wa * wb))
        .sum();
    let norm_a: f64 = a.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|w| w * w).sum::<f64>().sqrt();
    dot / (norm_a * norm_b)
}
