//! Retriever: embeds chunks into a vector store and queries it by text

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, VectorStoreProvider};
use crate::types::{Chunk, QueryResult, VectorRecord};

/// Embedding provider and vector store used together, with a default `k`
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
    k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStoreProvider>, k: usize) -> Self {
        Self {
            embedder,
            store,
            k: k.max(1),
        }
    }

    /// Same providers, different default `k`
    pub fn with_k(&self, k: usize) -> Self {
        Self {
            embedder: Arc::clone(&self.embedder),
            store: Arc::clone(&self.store),
            k: k.max(1),
        }
    }

    /// Default number of chunks returned by [`Retriever::query`]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Embed and store every chunk under a fresh id; never deduplicates
    pub async fn index(&self, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "{} returned {} embeddings for {} chunks",
                self.embedder.name(),
                embeddings.len(),
                chunks.len()
            )));
        }

        let records: Vec<VectorRecord> = embeddings
            .into_iter()
            .zip(chunks)
            .map(|(embedding, chunk)| VectorRecord::new(embedding, chunk))
            .collect();

        let stored = self.store.upsert(records).await?;
        tracing::info!(
            "Indexed {} chunks with {} into {}",
            stored,
            self.embedder.name(),
            self.store.name()
        );
        Ok(stored)
    }

    /// Top `k` chunks for `text` using the default `k`
    pub async fn query(&self, text: &str) -> Result<QueryResult> {
        self.query_k(text, self.k).await
    }

    /// At most `k` chunks by non-increasing similarity
    pub async fn query_k(&self, text: &str, k: usize) -> Result<QueryResult> {
        let embedding = self.embedder.embed(text).await?;
        let result = self.store.query(&embedding, k).await?;
        tracing::debug!("Retrieved {} chunks for query", result.len());
        Ok(result)
    }

    /// Number of stored vectors
    pub async fn len(&self) -> Result<usize> {
        self.store.len().await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        self.store.is_empty().await
    }

    /// Remove every stored vector
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }
}
