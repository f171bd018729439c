//! `GET /`: run the selected demo

use axum::extract::{Query, State};
use serde::Deserialize;

use crate::error::Result;
use crate::server::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AnswerParams {
    /// Replaces the configured question
    pub question: Option<String>,
}

/// Answer as plain text
pub async fn answer(State(state): State<AppState>, Query(params): Query<AnswerParams>) -> Result<String> {
    let start = std::time::Instant::now();
    let answer = state.runner().answer(params.question.as_deref()).await?;
    tracing::info!("Answered in {}ms", start.elapsed().as_millis());
    Ok(answer)
}
