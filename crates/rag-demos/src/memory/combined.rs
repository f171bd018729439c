use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Error, Result};

use super::{Memory, MemoryVariables};

/// Several memories behind one interface; keys must not overlap
pub struct CombinedMemory {
    members: Vec<Arc<dyn Memory>>,
}

impl CombinedMemory {
    pub fn new(members: Vec<Arc<dyn Memory>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for key in members.iter().flat_map(|m| m.memory_keys()) {
            if !seen.insert(key.clone()) {
                return Err(Error::Config(format!("duplicate memory key '{}'", key)));
            }
        }
        Ok(Self { members })
    }
}

#[async_trait]
impl Memory for CombinedMemory {
    fn memory_keys(&self) -> Vec<String> {
        self.members.iter().flat_map(|m| m.memory_keys()).collect()
    }

    async fn load(&self, input: &str) -> Result<MemoryVariables> {
        let mut variables = MemoryVariables::new();
        for member in &self.members {
            variables.extend(member.load(input).await?);
        }
        Ok(variables)
    }

    async fn save_context(&self, input: &str, output: &str) -> Result<()> {
        for member in &self.members {
            member.save_context(input, output).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::BufferMemory;
    use crate::providers::local::InMemoryChatHistory;

    fn buffer(key: &str) -> Arc<dyn Memory> {
        Arc::new(BufferMemory::new(key, Arc::new(InMemoryChatHistory::new()), "s"))
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let err = CombinedMemory::new(vec![buffer("history"), buffer("history")]).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_merges_and_saves_to_every_member() {
        let combined = CombinedMemory::new(vec![buffer("a"), buffer("b")]).unwrap();
        assert_eq!(combined.memory_keys(), vec!["a", "b"]);

        combined.save_context("hi", "hello").await.unwrap();
        let vars = combined.load("").await.unwrap();
        assert_eq!(vars["a"], "Human: hi\nAI: hello");
        assert_eq!(vars["b"], "Human: hi\nAI: hello");
    }
}
