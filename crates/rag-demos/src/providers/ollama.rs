//! Ollama client and providers for embeddings and chat

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::OllamaConfig;
use crate::error::{Error, Result, Service};

use super::embedding::EmbeddingProvider;
use super::llm::{ChatMessage, LlmProvider};
use super::retry::retry_transient;

/// Ollama API client with automatic retry
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Base URL without trailing slash
    base_url: String,
    /// Maximum retries
    max_retries: u32,
    /// First backoff delay
    retry_delay: Duration,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: OllamaMessage,
}

impl OllamaClient {
    /// Create a new Ollama client with retry support
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Override the first backoff delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Generate an embedding with retry
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let client = self.client.clone();

        retry_transient(self.max_retries, self.retry_delay, || {
            let url = url.clone();
            let client = client.clone();
            let request = EmbedRequest {
                model: model.to_string(),
                prompt: text.to_string(),
            };

            async move {
                let response = client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::from_transport(Service::Embedding, e))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::from_status(Service::Embedding, status, &body));
                }

                let embed_response: EmbedResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

                Ok(embed_response.embedding)
            }
        })
        .await
    }

    /// Non-streaming chat completion with retry
    pub async fn chat(&self, model: &str, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let client = self.client.clone();

        tracing::info!("Generating answer with model: {}", model);

        retry_transient(self.max_retries, self.retry_delay, || {
            let url = url.clone();
            let client = client.clone();
            let request = ChatRequest {
                model: model.to_string(),
                messages: messages
                    .iter()
                    .map(|m| OllamaMessage {
                        role: m.role.as_str().to_string(),
                        content: m.content.clone(),
                    })
                    .collect(),
                stream: false,
                options: ChatOptions { temperature },
            };

            async move {
                let response = client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::from_transport(Service::Llm, e))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::from_status(Service::Llm, status, &body));
                }

                let chat_response: ChatResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::llm(format!("Failed to parse chat response: {}", e)))?;

                Ok(chat_response.message.content)
            }
        })
        .await
    }
}

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    dimensions: usize,
    model: String,
}

impl OllamaEmbedder {
    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, dimensions: usize, model: impl Into<String>) -> Self {
        Self {
            client,
            dimensions,
            model: model.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(&self.model, text).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama chat provider
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    model: String,
    temperature: f32,
}

impl OllamaLlm {
    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        self.client.chat(&self.model, messages, self.temperature).await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> Arc<OllamaClient> {
        let config = OllamaConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            max_retries: 1,
        };
        Arc::new(
            OllamaClient::new(&config)
                .unwrap()
                .with_retry_delay(Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn test_embed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .and(body_partial_json(json!({"model": "nomic-embed-text", "prompt": "hola"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.5, 0.5, 0.0]})))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::from_client(client_for(&server), 3, "nomic-embed-text");
        let vectors = embedder
            .embed_batch(&["hola".to_string(), "hola".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vec![0.5, 0.5, 0.0]);
    }

    #[tokio::test]
    async fn test_chat_sends_roles() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "stream": false,
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Hi"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"role": "assistant", "content": "Hello."}
            })))
            .mount(&server)
            .await;

        let llm = OllamaLlm::from_client(client_for(&server), "llama3", 0.2);
        let answer = llm
            .chat(&[ChatMessage::system("Be brief."), ChatMessage::user("Hi")])
            .await
            .unwrap();
        assert_eq!(answer, "Hello.");
        assert_eq!(llm.model(), "llama3");
    }

    #[tokio::test]
    async fn test_persistent_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let llm = OllamaLlm::from_client(client_for(&server), "llama3", 0.2);
        let err = llm.complete("Hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let config = OllamaConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            max_retries: 0,
        };
        let client = OllamaClient::new(&config).unwrap();
        assert!(!client.health_check().await);
    }
}
