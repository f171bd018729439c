//! `GET /previous-conversation`: seed the stored chat history

use axum::extract::State;

use crate::error::Result;
use crate::server::state::AppState;

pub async fn previous_conversation(State(state): State<AppState>) -> Result<&'static str> {
    state.runner().previous_conversation().await
}
