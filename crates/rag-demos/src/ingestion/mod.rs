//! Document ingestion: loading sources and splitting them into chunks

pub mod epub;
mod loader;
mod splitter;

pub use loader::{DocumentLoader, DocumentSource};
pub use splitter::TextSplitter;
