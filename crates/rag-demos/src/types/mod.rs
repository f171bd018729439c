//! Core types for documents, vectors, conversation turns and query results

pub mod document;
pub mod memory;
pub mod response;

pub use document::{Chunk, Document, Metadata, VectorRecord};
pub use memory::{MemoryTurn, Role};
pub use response::{QueryResult, ScoredChunk};
