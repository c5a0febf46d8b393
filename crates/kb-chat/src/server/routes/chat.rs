//! Chat endpoints: streamed answers and history

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;

use crate::chat::{get_history, ChatEvent};
use crate::error::Result;
use crate::server::extract::AuthUser;
use crate::server::state::AppState;
use crate::types::ChatMessage;

/// Body of `POST /api/chat/ask`
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: String,
    /// Prior messages; loaded from storage when absent
    #[serde(default)]
    pub history: Option<Vec<ChatMessage>>,
}

/// `fragment` carries the text as a JSON string, `done` the exchange id,
/// `error` the user-facing message
fn sse_event(event: ChatEvent) -> Event {
    let (name, data) = match event {
        ChatEvent::Fragment(text) => ("fragment", serde_json::Value::String(text)),
        ChatEvent::Done { exchange_id } => ("done", json!({ "exchange_id": exchange_id })),
        ChatEvent::Error { message } => ("error", json!({ "message": message })),
    };
    Event::default().event(name).data(data.to_string())
}

/// POST /api/chat/ask
pub async fn ask(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let events = state.chat().ask(user.id, &request.question, request.history)?;

    Ok(Sse::new(events.map(|event| Ok(sse_event(event)))).keep_alive(KeepAlive::default()))
}

/// GET /api/chat/history
pub async fn history(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ChatMessage>>> {
    Ok(Json(get_history(state.db(), user.id)?))
}

