//! OpenAI-compatible REST client: embeddings, chat completions, files and fine-tuning jobs

use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{require, OpenAiConfig};
use crate::error::{Error, Result, Service};

use super::embedding::EmbeddingProvider;
use super::llm::{ChatMessage, LlmProvider};
use super::retry::retry_transient;

/// OpenAI API client with automatic retry of transient failures
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Uploaded file object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileObject {
    pub id: String,
    pub filename: String,
    pub purpose: String,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub created_at: i64,
}

/// Fine-tuning job object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineTuningJob {
    pub id: String,
    pub model: String,
    pub status: String,
    pub training_file: String,
    #[serde(default)]
    pub fine_tuned_model: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub finished_at: Option<i64>,
}

impl FineTuningJob {
    /// Whether the job has reached a final state
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

#[derive(Serialize)]
struct CreateJobRequest<'a> {
    training_file: &'a str,
    model: &'a str,
}

impl OpenAiClient {
    /// Create a client; fails when no API key is configured
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        let api_key = require(&config.api_key, "OPENAI_API_KEY")?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Override the first backoff delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn decode<R: DeserializeOwned>(service: Service, response: Response) -> Result<R> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(service, status, &body));
        }
        response
            .json()
            .await
            .map_err(|e| Error::from_transport(service, e))
    }

    async fn post_json<B, R>(&self, service: Service, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        let url = url.as_str();
        retry_transient(self.max_retries, self.retry_delay, || async move {
            let response = self
                .client
                .post(url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await
                .map_err(|e| Error::from_transport(service, e))?;
            Self::decode(service, response).await
        })
        .await
    }

    async fn get_json<R: DeserializeOwned>(&self, service: Service, path: &str) -> Result<R> {
        let url = self.url(path);
        let url = url.as_str();
        retry_transient(self.max_retries, self.retry_delay, || async move {
            let response = self
                .client
                .get(url)
                .bearer_auth(&self.api_key)
                .send()
                .await
                .map_err(|e| Error::from_transport(service, e))?;
            Self::decode(service, response).await
        })
        .await
    }

    /// Embed texts in one request; output order matches input order
    pub async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest { model, input: texts };
        let response: EmbeddingResponse = self
            .post_json(Service::Embedding, "embeddings", &request)
            .await?;

        if response.data.len() != texts.len() {
            return Err(Error::embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    /// Chat completion; returns the first choice's content
    pub async fn chat(&self, model: &str, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        let request = ChatRequest {
            model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature,
        };

        tracing::debug!("Chat completion with model {} ({} messages)", model, messages.len());

        let response: ChatResponse = self
            .post_json(Service::Llm, "chat/completions", &request)
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::llm("response contained no message content"))
    }

    /// Upload a file with the given purpose (e.g. `fine-tune`)
    pub async fn upload_file(&self, filename: &str, data: Vec<u8>, purpose: &str) -> Result<FileObject> {
        // multipart bodies are not cloneable, so uploads are sent once
        let form = multipart::Form::new()
            .text("purpose", purpose.to_string())
            .part("file", multipart::Part::bytes(data).file_name(filename.to_string()));

        let response = self
            .client
            .post(self.url("files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::from_transport(Service::Llm, e))?;
        Self::decode(Service::Llm, response).await
    }

    /// Start a fine-tuning job on an uploaded training file
    pub async fn create_fine_tuning_job(&self, training_file: &str, model: &str) -> Result<FineTuningJob> {
        let request = CreateJobRequest { training_file, model };
        self.post_json(Service::Llm, "fine_tuning/jobs", &request).await
    }

    /// Fetch a fine-tuning job
    pub async fn retrieve_fine_tuning_job(&self, job_id: &str) -> Result<FineTuningJob> {
        self.get_json(Service::Llm, &format!("fine_tuning/jobs/{}", job_id)).await
    }
}

/// OpenAI embedding provider
pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    /// Create from a shared client
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>, dimensions: usize, batch_size: usize) -> Self {
        Self {
            client,
            model: model.into(),
            dimensions,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.client.embed(&self.model, &[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| Error::embedding("empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.client.embed(&self.model, batch).await?);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// OpenAI chat-completion provider
pub struct OpenAiChat {
    client: Arc<OpenAiClient>,
    model: String,
    temperature: f32,
}

impl OpenAiChat {
    /// Create from a shared client
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiChat {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        self.client.chat(&self.model, messages, self.temperature).await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
