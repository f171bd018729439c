//! Conversation turn types

use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Prefix used when a turn is rendered into a text prompt
    pub fn prefix(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "Human",
            Role::Assistant => "AI",
        }
    }

    /// Role name in chat-completion APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of a session's append-only conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryTurn {
    pub role: Role,
    pub text: String,
}

impl MemoryTurn {
    /// Turn spoken by the user
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// Turn spoken by the model
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }

    /// System instruction
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
        }
    }

    /// `Human: ...` / `AI: ...` line
    pub fn render(&self) -> String {
        format!("{}: {}", self.role.prefix(), self.text)
    }
}

/// Render turns in order, one per line
pub fn render_turns(turns: &[MemoryTurn]) -> String {
    turns
        .iter()
        .map(MemoryTurn::render)
        .collect::<Vec<_>>()
        .join("\n")
}
