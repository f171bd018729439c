//! Recursive character text splitting
//!
//! Text is cut on the first separator that occurs in it; any piece still
//! longer than `chunk_size` is cut again with the next separator, down to
//! single characters. Pieces are then merged greedily back up to
//! `chunk_size`. Lengths are counted in chars, not bytes.

use std::collections::VecDeque;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Deterministic, size-bounded text splitter
#[derive(Debug, Clone)]
pub struct TextSplitter {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Characters carried over between consecutive chunks
    chunk_overlap: usize,
    /// Separators, coarsest first
    separators: Vec<String>,
}

impl TextSplitter {
    /// Create a splitter with the default separators
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Self::with_separators(chunk_size, chunk_overlap, ChunkingConfig::default().separators)
    }

    /// Create a splitter with custom separators
    pub fn with_separators(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: Vec<String>,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators,
        })
    }

    /// Create from config
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::with_separators(config.chunk_size, config.chunk_overlap, config.separators.clone())
    }

    /// Maximum chunk size in characters
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split text into trimmed, non-empty chunks of at most `chunk_size` chars
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split every document, copying its metadata and numbering chunks per document
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in documents {
            for (index, text) in self.split_text(&doc.text).into_iter().enumerate() {
                let mut metadata = doc.metadata.clone();
                metadata.insert("chunk_index".to_string(), serde_json::json!(index));
                chunks.push(Chunk::with_metadata(text, metadata));
            }
        }
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()));
        let (separator, remaining): (&str, &[String]) = match position {
            Some(i) => (&separators[i], &separators[i + 1..]),
            None => ("", &[]),
        };

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            chunks.extend(self.split_recursive(piece, remaining));
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }

        chunks
    }

    /// Greedily join pieces up to `chunk_size`, keeping up to `chunk_overlap`
    /// trailing characters as the start of the next chunk
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joined_len = |current: &VecDeque<&str>, total: usize| {
                total + len + if current.is_empty() { 0 } else { sep_len }
            };

            if !current.is_empty() && joined_len(&current, total) > self.chunk_size {
                if let Some(chunk) = join_trimmed(&current, separator) {
                    chunks.push(chunk);
                }

                while total > self.chunk_overlap
                    || (total > 0 && joined_len(&current, total) > self.chunk_size)
                {
                    let count = current.len();
                    match current.pop_front() {
                        Some(front) => {
                            total -= char_len(front) + if count > 1 { sep_len } else { 0 };
                        }
                        None => break,
                    }
                }
            }

            total = joined_len(&current, total);
            current.push_back(piece);
        }

        if let Some(chunk) = join_trimmed(&current, separator) {
            chunks.push(chunk);
        }

        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join_trimmed(pieces: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = pieces.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
