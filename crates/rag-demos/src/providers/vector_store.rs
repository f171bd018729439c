//! Vector store provider trait for storing and searching embeddings

use async_trait::async_trait;
use crate::error::Result;
use crate::types::{QueryResult, VectorRecord};

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `InMemoryVectorStore`: brute-force cosine search in process memory
/// - `PineconeVectorStore`: Pinecone data-plane REST API
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Store records; never deduplicates
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize>;

    /// At most `k` chunks by non-increasing similarity; never mutates the store
    async fn query(&self, embedding: &[f32], k: usize) -> Result<QueryResult>;

    /// Get total number of vectors stored
    async fn len(&self) -> Result<usize>;

    /// Check if store is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Remove every record
    async fn clear(&self) -> Result<()>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
