//! Query results

use serde::{Deserialize, Serialize};

use super::document::Chunk;

/// A retrieved chunk with its similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Similarity, higher is more similar
    pub score: f32,
}

/// Chunks ordered by non-increasing score, at most `k` of them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub matches: Vec<ScoredChunk>,
}

impl QueryResult {
    /// Sort by descending score (stable, so ties keep their order) and keep the first `k`
    pub fn from_unsorted(mut matches: Vec<ScoredChunk>, k: usize) -> Self {
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(k);
        Self { matches }
    }

    /// Number of matches
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Whether nothing matched
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Best match
    pub fn top(&self) -> Option<&ScoredChunk> {
        self.matches.first()
    }

    /// Chunks in rank order
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.matches.iter().map(|m| &m.chunk)
    }

    /// Chunk texts in rank order
    pub fn texts(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.chunk.text.as_str()).collect()
    }
}
