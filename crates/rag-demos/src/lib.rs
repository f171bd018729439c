//! rag-demos: retrieval-augmented answering demos behind swappable providers
//!
//! Documents (plain text, EPUB, Notion pages) are split into chunks, embedded,
//! stored in a vector index and retrieved to ground LLM answers. Conversation
//! memory comes from chat history stores or from the vector index itself. Each
//! demo profile composes these pieces and is served over HTTP; a separate tool
//! drives OpenAI fine-tuning jobs.

pub mod config;
pub mod demos;
pub mod error;
pub mod finetune;
pub mod generation;
pub mod ingestion;
pub mod memory;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::{DemoProfile, RagConfig};
pub use demos::{DemoRunner, DemoServices};
pub use error::{Error, ErrorKind, Result};
pub use retrieval::Retriever;
pub use types::{Chunk, Document, MemoryTurn, QueryResult, Role, ScoredChunk};
