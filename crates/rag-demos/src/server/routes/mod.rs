//! Routes of the demo server

pub mod answer;
pub mod conversation;
pub mod index;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::server::state::AppState;

/// `/`, `/index-docs` and `/previous-conversation`
pub fn demo_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(answer::answer))
        .route("/index-docs", get(index::index_docs))
        .route("/previous-conversation", get(conversation::previous_conversation))
}

/// Routes nested under `/api`
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<Value> {
    let runner = state.runner();
    let profile = runner.profile();
    let services = runner.services();

    let mut endpoints = serde_json::Map::new();
    endpoints.insert("GET /".into(), json!("Answer the demo question (optional ?question=...)"));
    if profile.has_index_route() {
        endpoints.insert("GET /index-docs".into(), json!("Index the demo documents"));
    }
    if profile.has_conversation_route() {
        endpoints.insert(
            "GET /previous-conversation".into(),
            json!("Seed the stored conversation"),
        );
    }

    Json(json!({
        "name": "rag-demos",
        "version": env!("CARGO_PKG_VERSION"),
        "profile": profile.as_str(),
        "question": runner.question(),
        "retrieval": profile.uses_retrieval(),
        "top_k": runner.top_k(),
        "providers": {
            "llm": services.llm.name(),
            "model": services.llm.model(),
            "embeddings": services.embedder.name(),
            "vector_store": services.store.name(),
            "chat_history": services.history.name(),
        },
        "endpoints": endpoints,
    }))
}
