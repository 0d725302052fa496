//! Conversation reads and writes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chat_core::wire::{CountResponse, SendMessageRequest};
use chat_core::{Message, ResolvedConversation};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ApiResult;
use crate::state::{AppState, Identity};

/// `GET /v1/conversations/:booking_id`
pub async fn resolve(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(booking_id): Path<String>,
) -> ApiResult<Json<ResolvedConversation>> {
    let conversation = state.backend.resolve_conversation(&booking_id, &user).await?;
    Ok(Json(conversation))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Only messages with a larger id.
    pub after: Option<i64>,
    /// Page size; clamped by the backend.
    pub limit: Option<u32>,
}

/// `GET /v1/conversations/:booking_id/messages[?after=&limit=]`
pub async fn history(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(booking_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let messages = match (query.after, query.limit) {
        (None, None) => state.backend.fetch_history(&booking_id, &user).await?,
        (after, limit) => {
            state
                .backend
                .fetch_history_after(
                    &booking_id,
                    &user,
                    after.unwrap_or(0),
                    limit.unwrap_or(u32::MAX),
                )
                .await?
        }
    };
    debug!(conversation_id = %booking_id, count = messages.len(), "History served");
    Ok(Json(messages))
}

/// `POST /v1/conversations/:booking_id/messages`
pub async fn send(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(booking_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let content = request.into_content()?;
    let message = state.backend.append(&booking_id, &user, content).await?;
    info!(
        conversation_id = %booking_id,
        message_id = message.id,
        kind = message.content.kind(),
        "Message sent"
    );
    Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /v1/conversations/:booking_id/read`
pub async fn mark_read(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(booking_id): Path<String>,
) -> ApiResult<Json<Vec<Message>>> {
    let updated = state.backend.mark_read(&booking_id, &user).await?;
    Ok(Json(updated))
}

/// `DELETE /v1/conversations/:booking_id/messages`
pub async fn clear(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(booking_id): Path<String>,
) -> ApiResult<Json<CountResponse>> {
    let count = state.backend.delete_conversation(&booking_id, &user).await?;
    Ok(Json(CountResponse { count }))
}

/// `DELETE /v1/messages/:message_id`
pub async fn delete_message(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(message_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.backend.delete_own(message_id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /v1/conversations/:booking_id/typing`
pub async fn typing(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(booking_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.backend.send_typing(&booking_id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}
