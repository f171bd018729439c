//! Demo profiles: each one composes loaders, retrieval, memory and a chain
//!
//! Every profile answers `GET /`. Profiles backed by a persistent index also
//! expose `/index-docs`, and `history-memory` can seed its stored conversation.

mod services;

use std::sync::Arc;

use crate::config::{require, ChunkingConfig, DemoConfig, DemoProfile, NotionConfig, RagConfig};
use crate::error::{Error, Result};
use crate::generation::{
    ConversationalRetrievalQa, LlmChain, PromptTemplate, RetrievalQa, TranslationChain,
};
use crate::ingestion::{DocumentSource, TextSplitter};
use crate::memory::{BufferMemory, CombinedMemory, Memory, VectorStoreMemory};
use crate::providers::local::{InMemoryChatHistory, InMemoryVectorStore};
use crate::providers::ChatMessage;
use crate::retrieval::Retriever;
use crate::types::MemoryTurn;

pub use services::DemoServices;

/// QA prompt of the `chatbot-book` profile
pub const BOOK_QA_TEMPLATE: &str = r#"Context:
{context}

History:
{chat_history}

Question: {question}
Answer:"#;

/// Prompt of the `notion-memory` profile
pub const NOTION_MEMORY_TEMPLATE: &str = r#"Initial conversation:
{history_initial}

Current conversation:
{history_current}

Next question
User: {input}
AI answer:"#;

/// Prompt of the `history-memory` profile
pub const HISTORY_MEMORY_TEMPLATE: &str = r#"Relevant documents:
{history}

Current conversation:
{history_current}

Next question
User: {input}
AI answer:"#;

/// Stored as the model's reply to the instructions page
pub const INSTRUCTIONS_ACK: &str = "Alright";

/// Body returned by `/index-docs` for `manage-vectors`
pub const INDEXED: &str = "indexed";

/// Body returned by the Notion profiles' routes
pub const SUCCESS: &str = "success";

impl DemoProfile {
    /// Question asked when none is configured
    pub fn default_question(&self) -> &'static str {
        match self {
            DemoProfile::Chat => "What is your name?",
            DemoProfile::Translate => "",
            DemoProfile::ReadingDocument => "Who is Axel?",
            DemoProfile::ReadingBook | DemoProfile::ChatbotBook => "Who is Jaskier?",
            DemoProfile::ManageVectors => "Who is Carlos?",
            DemoProfile::NotionMemory => "Who is Carlos Huamani?",
            DemoProfile::HistoryMemory => "What is my name?",
        }
    }

    /// Conversation used when none is configured
    pub fn default_conversation(&self) -> Vec<MemoryTurn> {
        match self {
            DemoProfile::ChatbotBook => vec![MemoryTurn::user("Hi, my name is Carlos")],
            DemoProfile::NotionMemory => vec![
                MemoryTurn::user("My name is Carlos"),
                MemoryTurn::assistant("Nice to meet you"),
            ],
            DemoProfile::HistoryMemory => vec![
                MemoryTurn::user("Hi, my name is Carlos Huamani and I am a software developer"),
                MemoryTurn::assistant("Hi, nice to meet you. I am an artificial intelligence"),
                MemoryTurn::user("I am 31 years old and I like programming in JavaScript"),
                MemoryTurn::assistant("I am 1 year old and I like programming in Python"),
            ],
            _ => Vec::new(),
        }
    }

    /// Retriever `k` when none is configured
    pub fn default_top_k(&self, configured: usize) -> usize {
        match self {
            DemoProfile::ManageVectors => 1,
            DemoProfile::NotionMemory | DemoProfile::HistoryMemory => 10,
            _ => configured,
        }
    }

    /// Whether `/index-docs` exists for this profile
    pub fn has_index_route(&self) -> bool {
        matches!(
            self,
            DemoProfile::ManageVectors | DemoProfile::NotionMemory | DemoProfile::HistoryMemory
        )
    }

    /// Whether `/previous-conversation` exists for this profile
    pub fn has_conversation_route(&self) -> bool {
        *self == DemoProfile::HistoryMemory
    }
}

/// Runs the configured demo against shared providers
pub struct DemoRunner {
    demo: DemoConfig,
    chunking: ChunkingConfig,
    notion: NotionConfig,
    session_id: String,
    top_k: usize,
    services: DemoServices,
}

impl DemoRunner {
    pub fn new(config: &RagConfig, services: DemoServices) -> Result<Self> {
        // fail at startup rather than on the first request
        TextSplitter::from_config(&config.chunking)?;

        let top_k = config
            .demo
            .top_k
            .unwrap_or_else(|| config.demo.profile.default_top_k(config.vector_store.top_k));

        Ok(Self {
            demo: config.demo.clone(),
            chunking: config.chunking.clone(),
            notion: config.notion.clone(),
            session_id: config.memory.session_id.clone(),
            top_k,
            services,
        })
    }

    pub fn profile(&self) -> DemoProfile {
        self.demo.profile
    }

    pub fn services(&self) -> &DemoServices {
        &self.services
    }

    /// Retriever `k` in effect
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Configured question, or the profile's default
    pub fn question(&self) -> &str {
        self.demo
            .question
            .as_deref()
            .unwrap_or_else(|| self.demo.profile.default_question())
    }

    fn conversation(&self) -> Vec<MemoryTurn> {
        self.demo
            .conversation
            .clone()
            .unwrap_or_else(|| self.demo.profile.default_conversation())
    }

    fn splitter(&self) -> Result<TextSplitter> {
        TextSplitter::from_config(&self.chunking)
    }

    /// Retriever over the configured (persistent) store
    fn shared_retriever(&self) -> Retriever {
        Retriever::new(
            Arc::clone(&self.services.embedder),
            Arc::clone(&self.services.store),
            self.top_k,
        )
    }

    /// Load, split and index `source` into a fresh in-memory store
    async fn transient_retriever(&self, source: DocumentSource) -> Result<Retriever> {
        let chunks = self
            .services
            .loader
            .load_and_split(&source, &self.splitter()?)
            .await?;
        let retriever = Retriever::new(
            Arc::clone(&self.services.embedder),
            Arc::new(InMemoryVectorStore::new()),
            self.top_k,
        );
        retriever.index(chunks).await?;
        Ok(retriever)
    }

    fn document_source(&self) -> DocumentSource {
        DocumentSource::TextFile {
            path: self.demo.document_path.clone(),
        }
    }

    fn book_source(&self) -> DocumentSource {
        DocumentSource::Epub {
            path: self.demo.book_path.clone(),
        }
    }

    fn notion_source(&self) -> Result<DocumentSource> {
        let page_id = require(&self.notion.documents_id, "NOTION_DOCUMENTS_ID")?;
        Ok(DocumentSource::NotionPage {
            page_id: page_id.to_string(),
        })
    }

    /// Answer the configured question, or `question` when given
    pub async fn answer(&self, question: Option<&str>) -> Result<String> {
        let requested = question.map(str::trim).filter(|q| !q.is_empty());
        let question = requested.unwrap_or_else(|| self.question());
        let llm = Arc::clone(&self.services.llm);

        tracing::info!("Running {} demo", self.profile().as_str());

        match self.profile() {
            DemoProfile::Chat => llm.chat(&[ChatMessage::user(question)]).await,
            DemoProfile::Translate => {
                // a question passed in replaces the configured text
                let text = requested.unwrap_or(self.demo.text.as_str());
                TranslationChain::new(llm)
                    .translate(&self.demo.input_language, &self.demo.output_language, text)
                    .await
            }
            DemoProfile::ReadingDocument => {
                let retriever = self.transient_retriever(self.document_source()).await?;
                Ok(RetrievalQa::new(llm, retriever).ask(question).await?.answer)
            }
            DemoProfile::ReadingBook => {
                let retriever = self.transient_retriever(self.book_source()).await?;
                Ok(RetrievalQa::new(llm, retriever).ask(question).await?.answer)
            }
            DemoProfile::ChatbotBook => {
                let retriever = self.transient_retriever(self.book_source()).await?;
                let chain = ConversationalRetrievalQa::new(llm, retriever)
                    .with_qa_prompt(PromptTemplate::new(BOOK_QA_TEMPLATE));
                Ok(chain.ask(question, &self.conversation()).await?.answer)
            }
            DemoProfile::ManageVectors => {
                let chain = RetrievalQa::new(llm, self.shared_retriever());
                Ok(chain.ask(question).await?.answer)
            }
            DemoProfile::NotionMemory => self.notion_memory_answer(question).await,
            DemoProfile::HistoryMemory => self.history_memory_answer(question).await,
        }
    }

    async fn notion_memory_answer(&self, question: &str) -> Result<String> {
        let client = self
            .services
            .notion
            .as_ref()
            .ok_or_else(|| Error::Config("NOTION_API_KEY is not set".to_string()))?;
        let instructions_id = require(&self.notion.instructions_id, "NOTION_INSTRUCTIONS_ID")?;
        let instructions = client.paragraph_text(instructions_id).await?;

        let vector_memory = Arc::new(VectorStoreMemory::new("history_initial", self.shared_retriever()));
        vector_memory.save_context(&instructions, INSTRUCTIONS_ACK).await?;

        let buffer = Arc::new(BufferMemory::new(
            "history_current",
            Arc::new(InMemoryChatHistory::new()),
            self.session_id.clone(),
        ));
        buffer.seed(&self.conversation()).await?;

        let memory = CombinedMemory::new(vec![buffer as Arc<dyn Memory>, vector_memory as Arc<dyn Memory>])?;
        LlmChain::new(
            Arc::clone(&self.services.llm),
            PromptTemplate::new(NOTION_MEMORY_TEMPLATE),
        )
        .with_memory(Arc::new(memory))
        .call(question)
        .await
    }

    async fn history_memory_answer(&self, question: &str) -> Result<String> {
        let vector_memory = Arc::new(VectorStoreMemory::new("history", self.shared_retriever()));
        let buffer = Arc::new(BufferMemory::new(
            "history_current",
            Arc::clone(&self.services.history),
            self.session_id.clone(),
        ));

        let memory = CombinedMemory::new(vec![vector_memory as Arc<dyn Memory>, buffer as Arc<dyn Memory>])?;
        LlmChain::new(
            Arc::clone(&self.services.llm),
            PromptTemplate::new(HISTORY_MEMORY_TEMPLATE),
        )
        .with_memory(Arc::new(memory))
        .call(question)
        .await
    }

    /// Index the profile's documents into the configured store
    pub async fn index_docs(&self) -> Result<&'static str> {
        let (source, status) = match self.profile() {
            DemoProfile::ManageVectors => (self.document_source(), INDEXED),
            DemoProfile::NotionMemory | DemoProfile::HistoryMemory => (self.notion_source()?, SUCCESS),
            profile => {
                return Err(Error::NotFound(format!(
                    "/index-docs is not available for the {} demo",
                    profile.as_str()
                )))
            }
        };

        let chunks = self
            .services
            .loader
            .load_and_split(&source, &self.splitter()?)
            .await?;
        let count = self.shared_retriever().index(chunks).await?;
        tracing::info!("Indexed {} chunks from {}", count, source);
        Ok(status)
    }

    /// Append the seed conversation to the stored session
    pub async fn previous_conversation(&self) -> Result<&'static str> {
        if !self.profile().has_conversation_route() {
            return Err(Error::NotFound(format!(
                "/previous-conversation is not available for the {} demo",
                self.profile().as_str()
            )));
        }

        let turns = self.conversation();
        BufferMemory::new("history_current", Arc::clone(&self.services.history), self.session_id.clone())
            .seed(&turns)
            .await?;
        tracing::info!("Seeded {} turns into session {}", turns.len(), self.session_id);
        Ok(SUCCESS)
    }
}
