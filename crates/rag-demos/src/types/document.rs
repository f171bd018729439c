//! Document and chunk types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Free-form metadata attached to documents and chunks
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A loaded document before splitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Full text
    pub text: String,
    /// Loader metadata (source, chapter, page id, ...)
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document labelled with its source
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), serde_json::Value::String(source.into()));
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Source label, if the loader set one
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|v| v.as_str())
    }
}

/// Bounded-size fragment of a document; immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text
    pub text: String,
    /// Metadata inherited from the document plus `chunk_index`
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    /// Create a chunk without metadata
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Create a chunk carrying the given metadata
    pub fn with_metadata(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Position of this chunk within its document
    pub fn chunk_index(&self) -> Option<u64> {
        self.metadata.get("chunk_index").and_then(|v| v.as_u64())
    }

    /// Source label, if present
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|v| v.as_str())
    }
}

/// An embedded chunk as held by a vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Fresh id assigned at index time
    pub id: Uuid,
    /// Embedding of `chunk.text`
    pub embedding: Vec<f32>,
    /// The embedded chunk
    pub chunk: Chunk,
}

impl VectorRecord {
    /// Create a record with a new id
    pub fn new(embedding: Vec<f32>, chunk: Chunk) -> Self {
        Self {
            id: Uuid::new_v4(),
            embedding,
            chunk,
        }
    }
}
