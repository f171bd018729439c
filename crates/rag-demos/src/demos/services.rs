//! Provider wiring from configuration

use std::sync::Arc;

use crate::config::{EmbeddingBackend, MemoryBackend, ModelBackend, RagConfig, VectorBackend};
use crate::error::Result;
use crate::ingestion::DocumentLoader;
use crate::providers::{
    hashing::HashingEmbedder,
    local::{InMemoryChatHistory, InMemoryVectorStore, JsonFileChatHistory},
    notion::NotionClient,
    ollama::{OllamaClient, OllamaEmbedder, OllamaLlm},
    openai::{OpenAiChat, OpenAiClient, OpenAiEmbedder},
    pinecone::PineconeVectorStore,
    ChatHistoryProvider, EmbeddingProvider, LlmProvider, VectorStoreProvider,
};

/// Providers shared by every demo request
#[derive(Clone)]
pub struct DemoServices {
    pub llm: Arc<dyn LlmProvider>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    /// Configured vector store (in-memory or Pinecone)
    pub store: Arc<dyn VectorStoreProvider>,
    pub history: Arc<dyn ChatHistoryProvider>,
    pub loader: DocumentLoader,
    pub notion: Option<Arc<NotionClient>>,
    /// Set when chat or embeddings run on Ollama; probed by `/ready`
    pub ollama: Option<Arc<OllamaClient>>,
}

impl DemoServices {
    /// Build every provider the configuration selects
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        // one client per service, shared by chat and embeddings
        let mut openai: Option<Arc<OpenAiClient>> = None;
        let mut openai_client = || -> Result<Arc<OpenAiClient>> {
            if let Some(client) = &openai {
                return Ok(Arc::clone(client));
            }
            let client = Arc::new(OpenAiClient::new(&config.openai)?);
            openai = Some(Arc::clone(&client));
            Ok(client)
        };
        let mut ollama: Option<Arc<OllamaClient>> = None;
        let mut ollama_client = || -> Result<Arc<OllamaClient>> {
            if let Some(client) = &ollama {
                return Ok(Arc::clone(client));
            }
            let client = Arc::new(OllamaClient::new(&config.ollama)?);
            ollama = Some(Arc::clone(&client));
            Ok(client)
        };

        let llm: Arc<dyn LlmProvider> = match config.llm.backend {
            ModelBackend::OpenAi => Arc::new(OpenAiChat::new(
                openai_client()?,
                config.llm.model.clone(),
                config.llm.temperature,
            )),
            ModelBackend::Ollama => Arc::new(OllamaLlm::from_client(
                ollama_client()?,
                config.llm.model.clone(),
                config.llm.temperature,
            )),
        };

        let embedder: Arc<dyn EmbeddingProvider> = match config.embeddings.backend {
            EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(config.embeddings.dimensions)?),
            EmbeddingBackend::OpenAi => Arc::new(OpenAiEmbedder::new(
                openai_client()?,
                config.embeddings.model.clone(),
                config.embeddings.dimensions,
                config.embeddings.batch_size,
            )),
            EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::from_client(
                ollama_client()?,
                config.embeddings.dimensions,
                config.embeddings.model.clone(),
            )),
        };

        let store: Arc<dyn VectorStoreProvider> = match config.vector_store.backend {
            VectorBackend::Memory => Arc::new(InMemoryVectorStore::new()),
            VectorBackend::Pinecone => Arc::new(PineconeVectorStore::new(
                &config.vector_store.pinecone,
                config.openai.timeout_secs,
                config.openai.max_retries,
            )?),
        };

        let history: Arc<dyn ChatHistoryProvider> = match config.memory.backend {
            MemoryBackend::Memory => Arc::new(InMemoryChatHistory::new()),
            MemoryBackend::JsonFile => Arc::new(JsonFileChatHistory::open(&config.memory.path)?),
        };

        let notion = match &config.notion.api_key {
            Some(_) => Some(Arc::new(NotionClient::new(&config.notion)?)),
            None => None,
        };
        let loader = match &notion {
            Some(client) => DocumentLoader::with_notion(Arc::clone(client)),
            None => DocumentLoader::new(),
        };

        tracing::info!(
            "Providers ready (llm: {}/{}, embeddings: {}, vector store: {}, chat history: {})",
            llm.name(),
            llm.model(),
            embedder.name(),
            store.name(),
            history.name()
        );

        Ok(Self {
            llm,
            embedder,
            store,
            history,
            loader,
            notion,
            ollama,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_offline_wiring() {
        let mut config = RagConfig::default();
        config.llm.backend = ModelBackend::Ollama;
        config.embeddings.backend = EmbeddingBackend::Hashing;
        config.embeddings.dimensions = 64;

        let services = DemoServices::from_config(&config).unwrap();
        assert_eq!(services.llm.name(), "ollama");
        assert!(services.ollama.is_some());
        assert_eq!(services.embedder.name(), "hashing");
        assert_eq!(services.store.name(), "memory");
        assert!(services.notion.is_none());
    }

    #[test]
    fn test_missing_openai_key_fails_fast() {
        let err = DemoServices::from_config(&RagConfig::default()).err().unwrap();
        assert!(matches!(err, Error::Config(ref m) if m.contains("OPENAI_API_KEY")));
    }

    #[test]
    fn test_json_file_history_and_pinecone() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RagConfig::default();
        config.openai.api_key = Some("sk-test".to_string());
        config.memory.backend = MemoryBackend::JsonFile;
        config.memory.path = dir.path().join("history.json");
        config.vector_store.backend = VectorBackend::Pinecone;
        config.vector_store.pinecone.api_key = Some("pc".to_string());
        config.vector_store.pinecone.index_host = Some("idx.svc.pinecone.io".to_string());

        let services = DemoServices::from_config(&config).unwrap();
        assert_eq!(services.history.name(), "json_file");
        assert_eq!(services.store.name(), "pinecone");
        assert_eq!(services.llm.name(), "openai");
    }
}
