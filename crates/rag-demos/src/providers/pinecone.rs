//! Pinecone data-plane REST client
//!
//! Chunk text travels in the `text` metadata key next to the chunk's own metadata.

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::{require, PineconeConfig};
use crate::error::{Error, Result, Service};
use crate::types::{Chunk, Metadata, QueryResult, ScoredChunk, VectorRecord};

use super::retry::retry_transient;
use super::vector_store::VectorStoreProvider;

/// Vectors per upsert request
pub const UPSERT_BATCH_SIZE: usize = 100;

const TEXT_KEY: &str = "text";

/// Pinecone index accessed over HTTPS
pub struct PineconeVectorStore {
    client: Client,
    index_host: String,
    api_key: String,
    namespace: Option<String>,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: String,
    values: &'a [f32],
    metadata: Metadata,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    #[serde(default)]
    namespaces: HashMap<String, NamespaceStats>,
    #[serde(default)]
    total_vector_count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: usize,
}

impl PineconeVectorStore {
    /// Create from config; the API key and index host are required
    pub fn new(config: &PineconeConfig, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let api_key = require(&config.api_key, "PINECONE_API_KEY")?.to_string();
        let host = require(&config.index_host, "PINECONE_INDEX_HOST")?;
        let index_host = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host.trim_end_matches('/'))
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            index_host,
            api_key,
            namespace: config.namespace.clone().filter(|ns| !ns.is_empty()),
            max_retries,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Override the first backoff delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.index_host, path);
        let url = url.as_str();
        retry_transient(self.max_retries, self.retry_delay, || async move {
            let response = self
                .client
                .post(url)
                .header("Api-Key", &self.api_key)
                .json(body)
                .send()
                .await
                .map_err(|e| Error::from_transport(Service::VectorDb, e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::from_status(Service::VectorDb, status, &body));
            }
            response
                .json()
                .await
                .map_err(|e| Error::vector_db(format!("Failed to parse response: {}", e)))
        })
        .await
    }
}

fn to_metadata(chunk: &Chunk) -> Metadata {
    let mut metadata = chunk.metadata.clone();
    metadata.insert(TEXT_KEY.to_string(), Value::String(chunk.text.clone()));
    metadata
}

fn from_metadata(mut metadata: Metadata) -> Result<Chunk> {
    match metadata.remove(TEXT_KEY) {
        Some(Value::String(text)) => Ok(Chunk::with_metadata(text, metadata)),
        _ => Err(Error::vector_db("match is missing its text metadata")),
    }
}

#[async_trait]
impl VectorStoreProvider for PineconeVectorStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize> {
        let mut total = 0;
        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            let request = UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|r| UpsertVector {
                        id: r.id.to_string(),
                        values: &r.embedding,
                        metadata: to_metadata(&r.chunk),
                    })
                    .collect(),
                namespace: self.namespace.as_deref(),
            };
            let response: UpsertResponse = self.post("vectors/upsert", &request).await?;
            total += response.upserted_count;
        }
        tracing::debug!("Upserted {} vectors to Pinecone", total);
        Ok(total)
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<QueryResult> {
        if k == 0 {
            return Ok(QueryResult::default());
        }
        let request = QueryRequest {
            vector: embedding,
            top_k: k,
            include_metadata: true,
            namespace: self.namespace.as_deref(),
        };
        let response: QueryResponse = self.post("query", &request).await?;

        let matches = response
            .matches
            .into_iter()
            .map(|m| {
                Ok(ScoredChunk {
                    chunk: from_metadata(m.metadata)?,
                    score: m.score,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(QueryResult::from_unsorted(matches, k))
    }

    async fn len(&self) -> Result<usize> {
        let stats: IndexStats = self.post("describe_index_stats", &json!({})).await?;
        Ok(match &self.namespace {
            Some(ns) => stats.namespaces.get(ns).map(|s| s.vector_count).unwrap_or(0),
            None => stats.total_vector_count,
        })
    }

    async fn clear(&self) -> Result<()> {
        let mut request = json!({ "deleteAll": true });
        if let Some(ns) = &self.namespace {
            request["namespace"] = json!(ns);
        }
        let _: Value = self.post("vectors/delete", &request).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer, namespace: Option<&str>) -> PineconeVectorStore {
        let config = PineconeConfig {
            api_key: Some("pc-key".to_string()),
            index_host: Some(server.uri()),
            namespace: namespace.map(str::to_string),
        };
        PineconeVectorStore::new(&config, 5, 1)
            .unwrap()
            .with_retry_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_requires_host_and_key() {
        let config = PineconeConfig {
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        let err = PineconeVectorStore::new(&config, 5, 0).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("PINECONE_INDEX_HOST"));
    }

    #[test]
    fn test_bare_host_gets_https() {
        let config = PineconeConfig {
            api_key: Some("k".to_string()),
            index_host: Some("idx-123.svc.pinecone.io".to_string()),
            namespace: Some(String::new()),
        };
        let store = PineconeVectorStore::new(&config, 5, 0).unwrap();
        assert_eq!(store.index_host, "https://idx-123.svc.pinecone.io");
        assert!(store.namespace.is_none());
    }

    #[tokio::test]
    async fn test_upsert_batches_of_one_hundred() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .and(header("Api-Key", "pc-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 100})))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 50})))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server, None);
        let records = (0..250)
            .map(|i| VectorRecord::new(vec![i as f32, 1.0], Chunk::new(format!("chunk {}", i))))
            .collect();
        assert_eq!(store.upsert(records).await.unwrap(), 250);
    }

    #[tokio::test]
    async fn test_query_restores_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_partial_json(json!({"topK": 1, "includeMetadata": true, "namespace": "demo"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "matches": [{
                    "id": "a", "score": 0.92,
                    "metadata": {"text": "Carlos is a programmer.", "source": "document.txt"}
                }]
            })))
            .mount(&server)
            .await;

        let store = store_for(&server, Some("demo"));
        let result = store.query(&[0.1, 0.2], 1).await.unwrap();
        assert_eq!(result.texts(), vec!["Carlos is a programmer."]);
        assert_eq!(result.top().unwrap().chunk.source(), Some("document.txt"));
        assert!(!result.top().unwrap().chunk.metadata.contains_key("text"));
    }

    #[tokio::test]
    async fn test_namespace_stats_and_delete_all() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/describe_index_stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "namespaces": {"demo": {"vectorCount": 7}, "other": {"vectorCount": 3}},
                "totalVectorCount": 10
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vectors/delete"))
            .and(body_partial_json(json!({"deleteAll": true, "namespace": "demo"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server, Some("demo"));
        assert_eq!(store.len().await.unwrap(), 7);
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_forbidden_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let store = store_for(&server, None);
        let err = store.query(&[1.0], 3).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }
}
