//! Server-Sent-Events push streams.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Serialize;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::error::ApiResult;
use crate::state::{AppState, Identity};

/// SSE event name for conversation changes.
pub const MESSAGE_EVENT: &str = "message";
/// SSE event name for typing signals.
pub const TYPING_EVENT: &str = "typing";
/// SSE event name for inbox signals.
pub const INBOX_EVENT: &str = "inbox";

fn to_event<T: Serialize>(name: &'static str, value: &T) -> Result<Event, Infallible> {
    Ok(match Event::default().event(name).json_data(value) {
        Ok(event) => event,
        Err(e) => {
            warn!("Failed to encode {} event: {}", name, e);
            Event::default().comment("unencodable event dropped")
        }
    })
}

/// `GET /v1/conversations/:booking_id/events`
///
/// Carries `message` events (inserted, updated, deleted, cleared, resync)
/// and `typing` events from the other participant.
pub async fn conversation_events(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(booking_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let messages = state
        .backend
        .subscribe_messages(&booking_id, &user)
        .await?
        .map(|event| to_event(MESSAGE_EVENT, &event));
    let typing = state
        .backend
        .subscribe_typing(&booking_id, &user)
        .await?
        .map(|signal| to_event(TYPING_EVENT, &signal));

    info!(conversation_id = %booking_id, user_id = %user, "Event stream opened");
    Ok(Sse::new(messages.merge(typing)).keep_alive(KeepAlive::default()))
}

/// `GET /v1/inbox/events`
pub async fn inbox_events(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let inbox = state
        .backend
        .subscribe_inbox(&user)
        .await?
        .map(|signal| to_event(INBOX_EVENT, &signal));

    info!(user_id = %user, "Inbox stream opened");
    Ok(Sse::new(inbox).keep_alive(KeepAlive::default()))
}
