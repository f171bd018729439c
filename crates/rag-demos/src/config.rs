//! Configuration for the RAG demos
//!
//! Layering: built-in defaults, then an optional TOML file, then environment
//! variables. [`RagConfig::validate`] runs last and rejects any secret the
//! selected providers need but that is missing or empty.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::MemoryTurn;

/// Environment variable pointing at a TOML config file
pub const CONFIG_PATH_ENV: &str = "RAG_DEMOS_CONFIG";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// OpenAI-compatible API settings (shared by chat, embeddings and fine-tuning)
    pub openai: OpenAiConfig,
    /// Ollama settings
    pub ollama: OllamaConfig,
    /// Chat model selection
    pub llm: LlmConfig,
    /// Embedding model selection
    pub embeddings: EmbeddingConfig,
    /// Vector store selection
    pub vector_store: VectorStoreConfig,
    /// Text chunking configuration
    pub chunking: ChunkingConfig,
    /// Conversation history store
    pub memory: MemoryConfig,
    /// Notion document source
    pub notion: NotionConfig,
    /// Which demo the server runs and its inputs
    pub demo: DemoConfig,
    /// Fine-tuning tool settings
    pub finetune: FineTuneConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            enable_cors: true,
        }
    }
}

/// OpenAI-compatible REST API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Base URL including the version prefix
    pub base_url: String,
    /// API key (from OPENAI_API_KEY)
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for transient failures
    pub max_retries: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Ollama REST API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for transient failures
    pub max_retries: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Remote model provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    #[default]
    OpenAi,
    Ollama,
}

/// Chat model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: ModelBackend,
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::OpenAi,
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.9,
        }
    }
}

/// Embedding provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    OpenAi,
    Ollama,
    /// Offline feature-hashing embedder, no network
    Hashing,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    /// Model name
    pub model: String,
    /// Embedding dimensions
    pub dimensions: usize,
    /// Texts per embeddings request
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::OpenAi,
            model: "text-embedding-ada-002".to_string(),
            dimensions: 1536,
            batch_size: 512,
        }
    }
}

/// Vector store provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// In-process index, lives as long as the server
    #[default]
    Memory,
    Pinecone,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: VectorBackend,
    /// Default number of chunks a retriever returns
    pub top_k: usize,
    pub pinecone: PineconeConfig,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Memory,
            top_k: 4,
            pinecone: PineconeConfig::default(),
        }
    }
}

/// Pinecone data-plane settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PineconeConfig {
    /// API key (from PINECONE_API_KEY)
    pub api_key: Option<String>,
    /// Index host, e.g. `https://my-index-abc123.svc.us-east1-gcp.pinecone.io`
    pub index_host: Option<String>,
    /// Optional namespace inside the index
    pub namespace: Option<String>,
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters carried over from the previous chunk
    pub chunk_overlap: usize,
    /// Separators tried in order; the empty string splits into characters
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 0,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                " ".to_string(),
                String::new(),
            ],
        }
    }
}

/// Conversation history backend
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBackend {
    #[default]
    Memory,
    JsonFile,
}

/// Conversation history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub backend: MemoryBackend,
    /// File used by the json_file backend
    pub path: PathBuf,
    /// Session the demos read and write
    pub session_id: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        let path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rag-demos")
            .join("chat_history.json");

        Self {
            backend: MemoryBackend::Memory,
            path,
            session_id: "session-user-3".to_string(),
        }
    }
}

/// Notion API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    pub base_url: String,
    /// Integration token (from NOTION_API_KEY)
    pub api_key: Option<String>,
    /// Value for the Notion-Version header
    pub version: String,
    /// Page whose content is indexed by /index-docs
    pub documents_id: Option<String>,
    /// Page holding the assistant instructions
    pub instructions_id: Option<String>,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.notion.com/v1".to_string(),
            api_key: None,
            version: "2022-06-28".to_string(),
            documents_id: None,
            instructions_id: None,
        }
    }
}

/// Demo selected for the HTTP server
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DemoProfile {
    /// Single message to the chat model
    Chat,
    /// Prompt-templated translation
    Translate,
    /// Text file, in-memory index, retrieval QA
    #[default]
    ReadingDocument,
    /// EPUB, in-memory index, retrieval QA
    ReadingBook,
    /// EPUB with conversational retrieval QA
    ChatbotBook,
    /// Index on demand, query with k = 1
    ManageVectors,
    /// Notion documents, vector memory and buffer memory
    NotionMemory,
    /// Notion documents, vector memory and persisted chat history
    HistoryMemory,
}

impl DemoProfile {
    /// All profiles, in declaration order
    pub const ALL: [DemoProfile; 8] = [
        DemoProfile::Chat,
        DemoProfile::Translate,
        DemoProfile::ReadingDocument,
        DemoProfile::ReadingBook,
        DemoProfile::ChatbotBook,
        DemoProfile::ManageVectors,
        DemoProfile::NotionMemory,
        DemoProfile::HistoryMemory,
    ];

    /// Kebab-case name as used in config files
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoProfile::Chat => "chat",
            DemoProfile::Translate => "translate",
            DemoProfile::ReadingDocument => "reading-document",
            DemoProfile::ReadingBook => "reading-book",
            DemoProfile::ChatbotBook => "chatbot-book",
            DemoProfile::ManageVectors => "manage-vectors",
            DemoProfile::NotionMemory => "notion-memory",
            DemoProfile::HistoryMemory => "history-memory",
        }
    }

    /// Whether the profile pulls its documents from Notion
    pub fn uses_notion(&self) -> bool {
        matches!(self, DemoProfile::NotionMemory | DemoProfile::HistoryMemory)
    }

    /// Whether the profile retrieves chunks at all
    pub fn uses_retrieval(&self) -> bool {
        !matches!(self, DemoProfile::Chat | DemoProfile::Translate)
    }
}

impl std::str::FromStr for DemoProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DemoProfile::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| Error::Config(format!("Unknown demo profile: {}", s)))
    }
}

/// Inputs of the selected demo
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub profile: DemoProfile,
    /// Overrides the profile's built-in question
    pub question: Option<String>,
    /// Plain-text document for reading-document and manage-vectors
    pub document_path: PathBuf,
    /// EPUB for reading-book and chatbot-book
    pub book_path: PathBuf,
    /// Overrides the profile's retriever k
    pub top_k: Option<usize>,
    /// Overrides the profile's seed conversation
    pub conversation: Option<Vec<MemoryTurn>>,
    /// Translation source language
    pub input_language: String,
    /// Translation target language
    pub output_language: String,
    /// Text to translate
    pub text: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            profile: DemoProfile::default(),
            question: None,
            document_path: PathBuf::from("./document.txt"),
            book_path: PathBuf::from("./libro.epub"),
            top_k: None,
            conversation: None,
            input_language: "Spanish".to_string(),
            output_language: "Italian".to_string(),
            text: "Me encanta programar".to_string(),
        }
    }
}

/// Fine-tuning tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FineTuneConfig {
    /// JSONL training file uploaded by the `upload` action
    pub training_file: PathBuf,
    /// Base model for new jobs
    pub base_model: String,
    /// System message for the `ask` action
    pub persona: String,
    /// User message for the `ask` action
    pub greeting: String,
    /// Temperature for the `ask` action
    pub temperature: f32,
}

impl Default for FineTuneConfig {
    fn default() -> Self {
        Self {
            training_file: PathBuf::from("mydata.jsonl"),
            base_model: "gpt-3.5-turbo-0613".to_string(),
            persona: "Assume the role of the assistant Rob".to_string(),
            greeting: "Hi, what can you help me with?".to_string(),
            temperature: 0.5,
        }
    }
}

impl RagConfig {
    /// Load defaults, then `path` (or `$RAG_DEMOS_CONFIG`), then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse a TOML file; missing sections fall back to defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Overlay environment variables using `lookup`; empty values are treated as unset
    ///
    /// A value that is set but cannot be parsed is an error naming the variable.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("PORT is not a valid port number: {}", port)))?;
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.openai.base_url = url;
        }
        if let Some(url) = get("OLLAMA_BASE_URL") {
            self.ollama.base_url = url;
        }
        if let Some(key) = get("PINECONE_API_KEY") {
            self.vector_store.pinecone.api_key = Some(key);
        }
        if let Some(host) = get("PINECONE_INDEX_HOST") {
            self.vector_store.pinecone.index_host = Some(host);
        }
        if let Some(ns) = get("PINECONE_NAMESPACE") {
            self.vector_store.pinecone.namespace = Some(ns);
        }
        if let Some(key) = get("NOTION_API_KEY") {
            self.notion.api_key = Some(key);
        }
        if let Some(id) = get("NOTION_DOCUMENTS_ID") {
            self.notion.documents_id = Some(id);
        }
        if let Some(id) = get("NOTION_INSTRUCTIONS_ID") {
            self.notion.instructions_id = Some(id);
        }
        if let Some(profile) = get("DEMO_PROFILE") {
            self.demo.profile = profile
                .parse()
                .map_err(|_| Error::Config(format!("DEMO_PROFILE is not a known demo profile: {}", profile)))?;
        }
        Ok(())
    }

    /// Check that everything the selected providers and demo need is present
    pub fn validate(&self) -> Result<()> {
        let needs_openai = self.llm.backend == ModelBackend::OpenAi
            || self.embeddings.backend == EmbeddingBackend::OpenAi;
        if needs_openai {
            require(&self.openai.api_key, "OPENAI_API_KEY")?;
        }

        if self.vector_store.backend == VectorBackend::Pinecone {
            require(&self.vector_store.pinecone.api_key, "PINECONE_API_KEY")?;
            require(&self.vector_store.pinecone.index_host, "PINECONE_INDEX_HOST")?;
        }

        if self.demo.profile.uses_notion() {
            require(&self.notion.api_key, "NOTION_API_KEY")?;
            require(&self.notion.documents_id, "NOTION_DOCUMENTS_ID")?;
        }
        if self.demo.profile == DemoProfile::NotionMemory {
            require(&self.notion.instructions_id, "NOTION_INSTRUCTIONS_ID")?;
        }

        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be positive".to_string()));
        }

        Ok(())
    }
}

/// Fail with the variable name when a secret is missing or blank
pub fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::Config(format!("{} is not set", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_need_openai_key() {
        let config = RagConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_env_overlay() {
        let mut config = RagConfig::default();
        config.apply_env(env(&[
            ("PORT", "8081"),
            ("OPENAI_API_KEY", "sk-test"),
            ("DEMO_PROFILE", "manage-vectors"),
            ("PINECONE_API_KEY", "pc-test"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.demo.profile, DemoProfile::ManageVectors);
        assert_eq!(config.vector_store.pinecone.api_key.as_deref(), Some("pc-test"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_env_value_is_unset() {
        let mut config = RagConfig::default();
        config.apply_env(env(&[("OPENAI_API_KEY", "   ")])).unwrap();
        assert!(config.openai.api_key.is_none());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_port_is_config_error() {
        let mut config = RagConfig::default();
        let err = config.apply_env(env(&[("PORT", "80a")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("PORT"));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_unknown_profile_is_config_error() {
        let mut config = RagConfig::default();
        let err = config
            .apply_env(env(&[("DEMO_PROFILE", "manage_vectors")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("DEMO_PROFILE"));
        assert_eq!(config.demo.profile, DemoProfile::ReadingDocument);
    }

    #[test]
    fn test_pinecone_requires_host() {
        let mut config = RagConfig::default();
        config.openai.api_key = Some("sk-test".to_string());
        config.vector_store.backend = VectorBackend::Pinecone;
        config.vector_store.pinecone.api_key = Some("pc".to_string());

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("PINECONE_INDEX_HOST"));
    }

    #[test]
    fn test_notion_profile_requires_ids() {
        let mut config = RagConfig::default();
        config.openai.api_key = Some("sk-test".to_string());
        config.notion.api_key = Some("secret".to_string());
        config.notion.documents_id = Some("docs".to_string());
        config.demo.profile = DemoProfile::NotionMemory;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("NOTION_INSTRUCTIONS_ID"));

        config.demo.profile = DemoProfile::HistoryMemory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_offline_profile_needs_no_secrets() {
        let mut config = RagConfig::default();
        config.llm.backend = ModelBackend::Ollama;
        config.embeddings.backend = EmbeddingBackend::Hashing;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = RagConfig::from_toml(
            r#"
            [demo]
            profile = "chatbot-book"
            question = "Who is Geralt?"

            [chunking]
            chunk_size = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.demo.profile, DemoProfile::ChatbotBook);
        assert_eq!(config.demo.question.as_deref(), Some("Who is Geralt?"));
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 0);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = RagConfig::default();
        config.openai.api_key = Some("sk-test".to_string());
        config.chunking.chunk_overlap = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_profile_round_trip_names() {
        for profile in DemoProfile::ALL {
            assert_eq!(profile.as_str().parse::<DemoProfile>().unwrap(), profile);
        }
        assert!("nope".parse::<DemoProfile>().is_err());
    }
}
