//! Document loaders for text files, EPUB books and Notion pages

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::notion::NotionClient;
use crate::types::{Chunk, Document};

use super::epub::load_epub;
use super::splitter::TextSplitter;

/// Where documents come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Whole file is one document
    TextFile { path: PathBuf },
    /// One document per non-empty chapter
    Epub { path: PathBuf },
    /// Text blocks of a Notion page as one document
    NotionPage { page_id: String },
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::TextFile { path } | DocumentSource::Epub { path } => {
                write!(f, "{}", path.display())
            }
            DocumentSource::NotionPage { page_id } => write!(f, "notion:{}", page_id),
        }
    }
}

/// Loads a [`DocumentSource`]; Notion pages need a client
#[derive(Default, Clone)]
pub struct DocumentLoader {
    notion: Option<Arc<NotionClient>>,
}

impl DocumentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader that can also read Notion pages
    pub fn with_notion(client: Arc<NotionClient>) -> Self {
        Self {
            notion: Some(client),
        }
    }

    /// Read a source into documents; any read failure is an error
    pub async fn load(&self, source: &DocumentSource) -> Result<Vec<Document>> {
        let documents = match source {
            DocumentSource::TextFile { path } => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| Error::ingestion(source.to_string(), e.to_string()))?;
                vec![Document::new(text, source.to_string())]
            }
            DocumentSource::Epub { path } => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || load_epub(&path))
                    .await
                    .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??
            }
            DocumentSource::NotionPage { page_id } => {
                let client = self.notion.as_ref().ok_or_else(|| {
                    Error::Config("NOTION_API_KEY is not set".to_string())
                })?;
                vec![client.load_page(page_id).await?]
            }
        };

        tracing::info!("Loaded {} documents from {}", documents.len(), source);
        Ok(documents)
    }

    /// Load a source and split every document
    pub async fn load_and_split(&self, source: &DocumentSource, splitter: &TextSplitter) -> Result<Vec<Chunk>> {
        let documents = self.load(source).await?;
        let chunks = splitter.split_documents(&documents);
        tracing::info!(
            "Split {} documents into {} chunks (chunk_size {})",
            documents.len(),
            chunks.len(),
            splitter.chunk_size()
        );
        Ok(chunks)
    }
}
