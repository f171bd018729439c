//! Chat history provider trait for per-session conversation logs

use async_trait::async_trait;
use crate::error::Result;
use crate::types::MemoryTurn;

/// Append-only, session-scoped conversation log
///
/// Implementations:
/// - `InMemoryChatHistory`: process memory
/// - `JsonFileChatHistory`: single JSON file on disk
#[async_trait]
pub trait ChatHistoryProvider: Send + Sync {
    /// Append a turn to the end of a session
    async fn append(&self, session_id: &str, turn: MemoryTurn) -> Result<()>;

    /// All turns of a session in insertion order
    async fn turns(&self, session_id: &str) -> Result<Vec<MemoryTurn>>;

    /// Drop a session's turns
    async fn clear(&self, session_id: &str) -> Result<()>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
