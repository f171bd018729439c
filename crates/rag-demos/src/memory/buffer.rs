use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::providers::ChatHistoryProvider;
use crate::types::memory::render_turns;
use crate::types::MemoryTurn;

use super::{Memory, MemoryVariables};

/// Whole conversation of one session, rendered as `Human:`/`AI:` lines
pub struct BufferMemory {
    key: String,
    history: Arc<dyn ChatHistoryProvider>,
    session_id: String,
}

impl BufferMemory {
    pub fn new(key: impl Into<String>, history: Arc<dyn ChatHistoryProvider>, session_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            history,
            session_id: session_id.into(),
        }
    }

    /// Append turns to the session as they are
    pub async fn seed(&self, turns: &[MemoryTurn]) -> Result<()> {
        for turn in turns {
            self.history.append(&self.session_id, turn.clone()).await?;
        }
        Ok(())
    }

    /// Session turns in insertion order
    pub async fn turns(&self) -> Result<Vec<MemoryTurn>> {
        self.history.turns(&self.session_id).await
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[async_trait]
impl Memory for BufferMemory {
    fn memory_keys(&self) -> Vec<String> {
        vec![self.key.clone()]
    }

    async fn load(&self, _input: &str) -> Result<MemoryVariables> {
        let turns = self.turns().await?;
        Ok(MemoryVariables::from([(self.key.clone(), render_turns(&turns))]))
    }

    async fn save_context(&self, input: &str, output: &str) -> Result<()> {
        self.history.append(&self.session_id, MemoryTurn::user(input)).await?;
        self.history
            .append(&self.session_id, MemoryTurn::assistant(output))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::local::InMemoryChatHistory;

    #[tokio::test]
    async fn test_renders_seed_and_saved_turns_in_order() {
        let history = Arc::new(InMemoryChatHistory::new());
        let memory = BufferMemory::new("history_current", history.clone(), "s1");
        memory
            .seed(&[MemoryTurn::user("My name is Carlos"), MemoryTurn::assistant("Nice to meet you")])
            .await
            .unwrap();
        memory.save_context("What is my name?", "Carlos").await.unwrap();

        let vars = memory.load("ignored").await.unwrap();
        assert_eq!(
            vars["history_current"],
            "Human: My name is Carlos\nAI: Nice to meet you\nHuman: What is my name?\nAI: Carlos"
        );
        assert_eq!(history.turns("s1").await.unwrap().len(), 4);
        assert!(history.turns("s2").await.unwrap().is_empty());
    }
}
