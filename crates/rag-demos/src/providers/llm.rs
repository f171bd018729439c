//! LLM provider trait for chat completion

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{MemoryTurn, Role};

/// One message of a chat-completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&MemoryTurn> for ChatMessage {
    fn from(turn: &MemoryTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.text.clone(),
        }
    }
}

/// Trait for chat-completion models
///
/// Implementations:
/// - `OpenAiChat`: OpenAI-compatible `/chat/completions`
/// - `OllamaLlm`: local Ollama `/api/chat`
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate the next assistant message
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Single user prompt
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(&[ChatMessage::user(prompt)]).await
    }

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
