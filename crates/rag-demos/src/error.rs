//! Error types for the RAG demos

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of a failure, used for retry decisions and HTTP mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or invalid configuration; retrying will not help
    Config,
    /// Credentials rejected by an external service
    Auth,
    /// Network failure, timeout, rate limit or upstream 5xx; may succeed on retry
    Transient,
    /// Anything else that will fail the same way again
    Permanent,
}

/// RAG system errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document could not be loaded or split
    #[error("Failed to ingest '{source_name}': {message}")]
    Ingestion {
        source_name: String,
        message: String,
    },

    /// Embedding error
    #[error("Embedding generation failed: {message}")]
    Embedding { kind: ErrorKind, message: String },

    /// Vector database error
    #[error("Vector database error: {message}")]
    VectorDb { kind: ErrorKind, message: String },

    /// LLM error
    #[error("LLM error: {message}")]
    Llm { kind: ErrorKind, message: String },

    /// Conversation history store error
    #[error("Memory store error: {0}")]
    Memory(String),

    /// Prompt template error
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Credentials rejected
    #[error("Authentication failed for {service}: {message}")]
    Auth { service: String, message: String },

    /// Route or resource not available
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which external service produced a status-code failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Embedding,
    VectorDb,
    Llm,
    Notion,
}

impl Service {
    fn label(self) -> &'static str {
        match self {
            Service::Embedding => "embedding provider",
            Service::VectorDb => "vector store",
            Service::Llm => "llm provider",
            Service::Notion => "notion",
        }
    }
}

impl Error {
    /// Create an ingestion error
    pub fn ingestion(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Ingestion {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a permanent embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            kind: ErrorKind::Permanent,
            message: message.into(),
        }
    }

    /// Create a permanent vector db error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb {
            kind: ErrorKind::Permanent,
            message: message.into(),
        }
    }

    /// Create a permanent LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            kind: ErrorKind::Permanent,
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify a non-success HTTP status returned by an external service
    pub fn from_status(service: Service, status: reqwest::StatusCode, body: &str) -> Self {
        let message = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {} - {}", status, body)
        };

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Self::Auth {
                service: service.label().to_string(),
                message,
            };
        }

        let kind = if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
        {
            ErrorKind::Transient
        } else {
            ErrorKind::Permanent
        };

        match service {
            Service::Embedding => Self::Embedding { kind, message },
            Service::VectorDb => Self::VectorDb { kind, message },
            Service::Llm => Self::Llm { kind, message },
            Service::Notion => Self::Ingestion {
                source_name: "notion".to_string(),
                message,
            },
        }
    }

    /// Classify a transport-level failure talking to an external service
    pub fn from_transport(service: Service, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() || err.is_connect() || err.is_request() {
            ErrorKind::Transient
        } else {
            ErrorKind::Permanent
        };
        let message = format!("request failed: {}", err);

        match service {
            Service::Embedding => Self::Embedding { kind, message },
            Service::VectorDb => Self::VectorDb { kind, message },
            Service::Llm => Self::Llm { kind, message },
            Service::Notion => Self::Ingestion {
                source_name: "notion".to_string(),
                message,
            },
        }
    }

    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Auth { .. } => ErrorKind::Auth,
            Error::Embedding { kind, .. } | Error::VectorDb { kind, .. } | Error::Llm { kind, .. } => *kind,
            Error::Http(err) if err.is_timeout() || err.is_connect() => ErrorKind::Transient,
            _ => ErrorKind::Permanent,
        }
    }

    /// Whether retrying the same call could succeed
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, error_type) = match &self {
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Ingestion { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "ingestion_error"),
            Error::Embedding { .. } => (status_for(kind), "embedding_error"),
            Error::VectorDb { .. } => (status_for(kind), "vector_db_error"),
            Error::Llm { .. } => (status_for(kind), "llm_error"),
            Error::Memory(_) => (StatusCode::INTERNAL_SERVER_ERROR, "memory_error"),
            Error::Prompt(_) => (StatusCode::INTERNAL_SERVER_ERROR, "prompt_error"),
            Error::Auth { .. } => (StatusCode::BAD_GATEWAY, "auth_error"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_GATEWAY, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        tracing::error!(error_type, ?kind, "request failed: {}", self);

        let body = Json(json!({
            "error": {
                "type": error_type,
                "kind": kind,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Auth => StatusCode::BAD_GATEWAY,
        ErrorKind::Config | ErrorKind::Permanent => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
