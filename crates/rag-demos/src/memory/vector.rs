use async_trait::async_trait;

use crate::error::Result;
use crate::retrieval::Retriever;
use crate::types::Chunk;

use super::{Memory, MemoryVariables};

/// Exchanges stored as vectors; loads the ones most relevant to the input
pub struct VectorStoreMemory {
    key: String,
    retriever: Retriever,
}

impl VectorStoreMemory {
    /// `retriever`'s default `k` bounds how many exchanges are loaded
    pub fn new(key: impl Into<String>, retriever: Retriever) -> Self {
        Self {
            key: key.into(),
            retriever,
        }
    }

    /// Text stored for one exchange
    pub fn format_exchange(input: &str, output: &str) -> String {
        format!("input: {}\noutput: {}", input, output)
    }
}

#[async_trait]
impl Memory for VectorStoreMemory {
    fn memory_keys(&self) -> Vec<String> {
        vec![self.key.clone()]
    }

    async fn load(&self, input: &str) -> Result<MemoryVariables> {
        let result = self.retriever.query(input).await?;
        Ok(MemoryVariables::from([(self.key.clone(), result.texts().join("\n"))]))
    }

    async fn save_context(&self, input: &str, output: &str) -> Result<()> {
        let mut chunk = Chunk::new(Self::format_exchange(input, output));
        chunk
            .metadata
            .insert("source".to_string(), serde_json::json!("memory"));
        self.retriever.index(vec![chunk]).await?;
        Ok(())
    }
}
