//! Fine-tuning tool: upload training data, start and poll jobs, chat with the result

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{FineTuneConfig, RagConfig};
use crate::error::{Error, Result};
use crate::providers::openai::{FileObject, FineTuningJob, OpenAiChat, OpenAiClient};
use crate::providers::{ChatMessage, LlmProvider};

/// Purpose sent with uploaded training files
pub const FINE_TUNE_PURPOSE: &str = "fine-tune";

/// Action selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum FineTuneAction {
    /// Upload the JSONL training file
    Upload,
    /// Poll a job by id
    Retrieve,
    /// Start a job from an uploaded file id
    Create,
    /// Chat with a fine-tuned model
    Ask,
}

impl FineTuneAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FineTuneAction::Upload => "upload",
            FineTuneAction::Retrieve => "retrieve",
            FineTuneAction::Create => "create",
            FineTuneAction::Ask => "ask",
        }
    }
}

impl FromStr for FineTuneAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upload" => Ok(FineTuneAction::Upload),
            "retrieve" => Ok(FineTuneAction::Retrieve),
            "create" => Ok(FineTuneAction::Create),
            "ask" => Ok(FineTuneAction::Ask),
            other => Err(Error::Config(format!(
                "Unknown action '{}', expected upload, retrieve, create or ask",
                other
            ))),
        }
    }
}

/// What an action produced
#[derive(Debug, Clone, PartialEq)]
pub enum FineTuneOutcome {
    Uploaded(FileObject),
    Job(FineTuningJob),
    /// The job exists but has no `finished_at` yet
    Pending { id: String, status: String },
    Reply(String),
}

impl fmt::Display for FineTuneOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pretty = |value: serde_json::Result<String>| value.map_err(|_| fmt::Error);
        match self {
            FineTuneOutcome::Uploaded(file) => write!(f, "{}", pretty(serde_json::to_string_pretty(file))?),
            FineTuneOutcome::Job(job) => write!(f, "{}", pretty(serde_json::to_string_pretty(job))?),
            FineTuneOutcome::Pending { id, status } => {
                write!(f, "Job {} is still pending (status: {})", id, status)
            }
            FineTuneOutcome::Reply(reply) => write!(f, "{}", reply),
        }
    }
}

/// Runs fine-tuning actions against an OpenAI-compatible API
pub struct FineTuner {
    client: Arc<OpenAiClient>,
    config: FineTuneConfig,
}

impl FineTuner {
    /// Build the API client; OPENAI_API_KEY is required
    pub fn new(config: &RagConfig) -> Result<Self> {
        let client = Arc::new(OpenAiClient::new(&config.openai)?);
        Ok(Self::from_client(client, config.finetune.clone()))
    }

    pub fn from_client(client: Arc<OpenAiClient>, config: FineTuneConfig) -> Self {
        Self { client, config }
    }

    /// Dispatch an action; `id` is needed by create and retrieve, `model` by ask
    pub async fn run(
        &self,
        action: FineTuneAction,
        id: Option<&str>,
        model: Option<&str>,
    ) -> Result<FineTuneOutcome> {
        tracing::info!("Running fine-tuning action: {}", action.as_str());
        match action {
            FineTuneAction::Upload => self.upload().await.map(FineTuneOutcome::Uploaded),
            FineTuneAction::Create => {
                let file_id = required(id, "--id (FINETUNE_ID)", action)?;
                self.create(file_id).await.map(FineTuneOutcome::Job)
            }
            FineTuneAction::Retrieve => {
                let job_id = required(id, "--id (FINETUNE_ID)", action)?;
                self.retrieve(job_id).await
            }
            FineTuneAction::Ask => {
                let model = required(model, "--model (FINETUNE_MODEL)", action)?;
                self.ask(model).await.map(FineTuneOutcome::Reply)
            }
        }
    }

    /// Upload the configured training file
    pub async fn upload(&self) -> Result<FileObject> {
        let path = &self.config.training_file;
        let data = tokio::fs::read(path).await.map_err(|e| {
            Error::ingestion(path.display().to_string(), format!("Failed to read training file: {}", e))
        })?;
        let filename = file_name(path);

        let file = self.client.upload_file(&filename, data, FINE_TUNE_PURPOSE).await?;
        tracing::info!("Uploaded {} as {} ({} bytes)", filename, file.id, file.bytes);
        Ok(file)
    }

    /// Start a job on the configured base model
    pub async fn create(&self, file_id: &str) -> Result<FineTuningJob> {
        let job = self
            .client
            .create_fine_tuning_job(file_id, &self.config.base_model)
            .await?;
        tracing::info!("Created fine-tuning job {} ({})", job.id, job.status);
        Ok(job)
    }

    /// The job when finished, otherwise a pending marker
    pub async fn retrieve(&self, job_id: &str) -> Result<FineTuneOutcome> {
        let job = self.client.retrieve_fine_tuning_job(job_id).await?;
        if job.is_finished() {
            Ok(FineTuneOutcome::Job(job))
        } else {
            tracing::debug!("Job {} not finished yet", job.id);
            Ok(FineTuneOutcome::Pending {
                id: job.id,
                status: job.status,
            })
        }
    }

    /// Greet the fine-tuned model in its persona
    pub async fn ask(&self, model: &str) -> Result<String> {
        let chat = OpenAiChat::new(Arc::clone(&self.client), model, self.config.temperature);
        chat.chat(&[
            ChatMessage::system(self.config.persona.clone()),
            ChatMessage::user(self.config.greeting.clone()),
        ])
        .await
    }
}

fn required<'a>(value: Option<&'a str>, flag: &str, action: FineTuneAction) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::Config(format!(
            "{} is required for the {} action",
            flag,
            action.as_str()
        ))),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "training.jsonl".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenAiConfig;
    use crate::error::ErrorKind;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tuner(server: &MockServer, config: FineTuneConfig) -> FineTuner {
        let openai = OpenAiConfig {
            base_url: format!("{}/v1", server.uri()),
            api_key: Some("sk-test".to_string()),
            timeout_secs: 5,
            max_retries: 0,
        };
        let client = OpenAiClient::new(&openai)
            .unwrap()
            .with_retry_delay(Duration::from_millis(1));
        FineTuner::from_client(Arc::new(client), config)
    }

    fn job(finished_at: Option<i64>) -> serde_json::Value {
        json!({
            "id": "ftjob-7", "model": "gpt-3.5-turbo-0613",
            "status": if finished_at.is_some() { "succeeded" } else { "running" },
            "training_file": "file-abc", "created_at": 1, "finished_at": finished_at
        })
    }

    #[test]
    fn test_parse_action() {
        assert_eq!("upload".parse::<FineTuneAction>().unwrap(), FineTuneAction::Upload);
        assert_eq!(" ASK ".parse::<FineTuneAction>().unwrap(), FineTuneAction::Ask);
        assert_eq!("delete".parse::<FineTuneAction>().unwrap_err().kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_upload_reads_training_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "file-abc", "filename": "mydata.jsonl", "purpose": "fine-tune", "bytes": 42
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let training_file = dir.path().join("mydata.jsonl");
        std::fs::write(&training_file, "{\"messages\": []}\n").unwrap();
        let config = FineTuneConfig {
            training_file,
            ..Default::default()
        };

        let outcome = tuner(&server, config)
            .run(FineTuneAction::Upload, None, None)
            .await
            .unwrap();
        match outcome {
            FineTuneOutcome::Uploaded(file) => assert_eq!(file.id, "file-abc"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_ingestion_error() {
        let server = MockServer::start().await;
        let config = FineTuneConfig {
            training_file: "/nonexistent/mydata.jsonl".into(),
            ..Default::default()
        };
        let err = tuner(&server, config).upload().await.unwrap_err();
        assert!(matches!(err, Error::Ingestion { .. }));
    }

    #[tokio::test]
    async fn test_create_uses_base_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/fine_tuning/jobs"))
            .and(body_partial_json(json!({
                "training_file": "file-abc", "model": "gpt-3.5-turbo-0613"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(job(None)))
            .mount(&server)
            .await;

        let outcome = tuner(&server, FineTuneConfig::default())
            .run(FineTuneAction::Create, Some("file-abc"), None)
            .await
            .unwrap();
        assert!(matches!(outcome, FineTuneOutcome::Job(ref j) if j.id == "ftjob-7"));
    }

    #[tokio::test]
    async fn test_retrieve_pending_then_finished() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/fine_tuning/jobs/ftjob-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(job(None)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/fine_tuning/jobs/ftjob-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(job(Some(1700000000))))
            .mount(&server)
            .await;

        let tuner = tuner(&server, FineTuneConfig::default());
        let first = tuner.retrieve("ftjob-7").await.unwrap();
        assert_eq!(
            first,
            FineTuneOutcome::Pending {
                id: "ftjob-7".to_string(),
                status: "running".to_string()
            }
        );
        assert!(first.to_string().contains("still pending"));

        let second = tuner.retrieve("ftjob-7").await.unwrap();
        assert!(matches!(second, FineTuneOutcome::Job(ref j) if j.is_finished()));
        assert!(second.to_string().contains("\"finished_at\": 1700000000"));
    }

    #[tokio::test]
    async fn test_ask_sends_persona_and_greeting() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "ft:gpt-3.5-turbo:rob",
                "temperature": 0.5,
                "messages": [
                    {"role": "system", "content": "Assume the role of the assistant Rob"},
                    {"role": "user", "content": "Hi, what can you help me with?"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "I'm Rob, ask me anything."}}]
            })))
            .mount(&server)
            .await;

        let outcome = tuner(&server, FineTuneConfig::default())
            .run(FineTuneAction::Ask, None, Some("ft:gpt-3.5-turbo:rob"))
            .await
            .unwrap();
        assert_eq!(outcome.to_string(), "I'm Rob, ask me anything.");
    }

    #[test]
    fn test_missing_id_or_model_is_config_error() {
        tokio_test::block_on(async {
            let server = MockServer::start().await;
            let tuner = tuner(&server, FineTuneConfig::default());

            for (action, id, model) in [
                (FineTuneAction::Create, None, None),
                (FineTuneAction::Retrieve, Some("  "), None),
                (FineTuneAction::Ask, Some("ftjob-7"), None),
            ] {
                let err = tuner.run(action, id, model).await.unwrap_err();
                assert_eq!(err.kind(), ErrorKind::Config);
            }
        });
    }
}
