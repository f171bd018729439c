//! Provider abstractions for embeddings, chat models, vector storage and chat history
//!
//! The pipeline only talks to these traits, so OpenAI, Ollama, Pinecone or the
//! in-process implementations can be swapped through configuration.

pub mod chat_history;
pub mod embedding;
pub mod hashing;
pub mod llm;
pub mod local;
pub mod notion;
pub mod ollama;
pub mod openai;
pub mod pinecone;
pub mod retry;
pub mod vector_store;

pub use chat_history::ChatHistoryProvider;
pub use embedding::EmbeddingProvider;
pub use llm::{ChatMessage, LlmProvider};
pub use vector_store::VectorStoreProvider;
