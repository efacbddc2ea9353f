//! In-memory policy clause index with cosine-similarity search.
//!
//! Built once at process start and injected into the evaluators. Loading an
//! id that is already present is a logged no-op; re-initialization must
//! never produce duplicate entries.

use super::embedding::EmbeddingModel;
use super::EvalError;

/// One indexed policy clause.
struct IndexedClause {
    id: String,
    text: String,
    source: String,
    embedding: Vec<f32>,
}

/// A clause returned from a similarity search.
#[derive(Debug, Clone)]
pub struct ScoredClause {
    pub id: String,
    pub text: String,
    pub source: String,
    pub score: f32,
}

/// In-memory vector index over the policy-exclusion corpus.
pub struct PolicyIndex {
    entries: Vec<IndexedClause>,
}

impl PolicyIndex {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Index one clause. Returns false (and changes nothing) when the id is
    /// already present.
    pub fn load(
        &mut self,
        id: &str,
        text: &str,
        source: &str,
        embedder: &dyn EmbeddingModel,
    ) -> Result<bool, EvalError> {
        if self.contains(id) {
            tracing::debug!(id, "Policy clause already indexed, skipping");
            return Ok(false);
        }

        let embedding = embedder.embed(text)?;
        self.entries.push(IndexedClause {
            id: id.to_string(),
            text: text.to_string(),
            source: source.to_string(),
            embedding,
        });
        Ok(true)
    }

    /// Top-k clauses by cosine similarity to the query embedding.
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Vec<ScoredClause> {
        let mut scored: Vec<(f32, &IndexedClause)> = self
            .entries
            .iter()
            .map(|entry| {
                let score = cosine_similarity(query_embedding, &entry.embedding);
                (score, entry)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .map(|(score, entry)| ScoredClause {
                id: entry.id.clone(),
                text: entry.text.clone(),
                source: entry.source.clone(),
                score,
            })
            .collect()
    }
}

impl Default for PolicyIndex {
    fn default() -> Self {
        Self::new()
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
