//! Conversation memory: variables rendered into prompts and updated after each answer

mod buffer;
mod combined;
mod vector;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;

pub use buffer::BufferMemory;
pub use combined::CombinedMemory;
pub use vector::VectorStoreMemory;

/// Memory variables keyed by prompt placeholder name
pub type MemoryVariables = BTreeMap<String, String>;

/// Source of prompt variables that remembers exchanges
#[async_trait]
pub trait Memory: Send + Sync {
    /// Variable names this memory fills
    fn memory_keys(&self) -> Vec<String>;

    /// Variables for the next prompt; `input` is the pending user input
    async fn load(&self, input: &str) -> Result<MemoryVariables>;

    /// Remember a completed exchange
    async fn save_context(&self, input: &str, output: &str) -> Result<()>;
}
