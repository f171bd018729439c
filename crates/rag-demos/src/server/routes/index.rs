//! `GET /index-docs`: load, split and index the demo documents

use axum::extract::State;

use crate::error::Result;
use crate::server::state::AppState;

pub async fn index_docs(State(state): State<AppState>) -> Result<&'static str> {
    state.runner().index_docs().await
}
