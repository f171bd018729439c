//! In-process providers: brute-force vector index and chat history stores

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::types::{MemoryTurn, QueryResult, ScoredChunk, VectorRecord};

use super::chat_history::ChatHistoryProvider;
use super::vector_store::VectorStoreProvider;

/// Cosine similarity; zero when either vector has no magnitude or the lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Vector index held in process memory, scanned linearly on query
#[derive(Default)]
pub struct InMemoryVectorStore {
    records: RwLock<Vec<VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStoreProvider for InMemoryVectorStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize> {
        let count = records.len();
        let mut stored = self.records.write();
        let expected = stored
            .first()
            .or(records.first())
            .map(|r| r.embedding.len());
        if let Some(expected) = expected {
            // the whole batch is rejected before anything is stored
            if let Some(bad) = records.iter().find(|r| r.embedding.len() != expected) {
                return Err(dimension_mismatch(expected, bad.embedding.len()));
            }
        }
        stored.extend(records);
        tracing::debug!("Stored {} vectors ({} total)", count, stored.len());
        Ok(count)
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<QueryResult> {
        let stored = self.records.read();
        if let Some(first) = stored.first() {
            if first.embedding.len() != embedding.len() {
                return Err(dimension_mismatch(first.embedding.len(), embedding.len()));
            }
        }
        let matches = stored
            .iter()
            .map(|record| ScoredChunk {
                chunk: record.chunk.clone(),
                score: cosine_similarity(embedding, &record.embedding),
            })
            .collect();
        Ok(QueryResult::from_unsorted(matches, k))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

fn dimension_mismatch(expected: usize, got: usize) -> Error {
    Error::vector_db(format!("dimension mismatch: index has {}, got {}", expected, got))
}

/// Chat history held in process memory, lost on restart
#[derive(Default)]
pub struct InMemoryChatHistory {
    sessions: DashMap<String, Vec<MemoryTurn>>,
}

impl InMemoryChatHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatHistoryProvider for InMemoryChatHistory {
    async fn append(&self, session_id: &str, turn: MemoryTurn) -> Result<()> {
        self.sessions.entry(session_id.to_string()).or_default().push(turn);
        Ok(())
    }

    async fn turns(&self, session_id: &str) -> Result<Vec<MemoryTurn>> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|turns| turns.clone())
            .unwrap_or_default())
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        self.sessions.remove(session_id);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTurn {
    #[serde(flatten)]
    turn: MemoryTurn,
    created_at: DateTime<Utc>,
}

type Sessions = BTreeMap<String, Vec<StoredTurn>>;

/// Chat history persisted as one JSON document, rewritten on every change
pub struct JsonFileChatHistory {
    path: PathBuf,
    sessions: Mutex<Sessions>,
}

impl JsonFileChatHistory {
    /// Open the store, loading existing sessions when the file exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let sessions = Self::load(&path)?;
        tracing::info!(
            "Loaded {} chat sessions from {}",
            sessions.len(),
            path.display()
        );
        Ok(Self {
            path,
            sessions: Mutex::new(sessions),
        })
    }

    fn load(path: &Path) -> Result<Sessions> {
        if !path.exists() {
            return Ok(Sessions::new());
        }
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data)
            .map_err(|e| Error::Memory(format!("Corrupt chat history {}: {}", path.display(), e)))
    }

    async fn save(&self, sessions: &Sessions) -> Result<()> {
        let data = serde_json::to_string_pretty(sessions)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, data).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatHistoryProvider for JsonFileChatHistory {
    async fn append(&self, session_id: &str, turn: MemoryTurn) -> Result<()> {
        // the lock is held across the write so snapshots land in order
        let mut sessions = self.sessions.lock().await;
        sessions.entry(session_id.to_string()).or_default().push(StoredTurn {
            turn,
            created_at: Utc::now(),
        });
        self.save(&sessions).await
    }

    async fn turns(&self, session_id: &str) -> Result<Vec<MemoryTurn>> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .get(session_id)
            .map(|turns| turns.iter().map(|t| t.turn.clone()).collect())
            .unwrap_or_default())
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        if sessions.remove(session_id).is_some() {
            self.save(&sessions).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "json_file"
    }
}
