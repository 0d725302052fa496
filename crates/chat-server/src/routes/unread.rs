//! Dashboard reads: unread counts and the conversation list.

use axum::extract::State;
use axum::Json;
use chat_core::wire::CountResponse;
use chat_core::{ConversationSummary, UnreadCounts};

use crate::error::ApiResult;
use crate::state::{AppState, Identity};

/// `GET /v1/unread`
pub async fn global(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> ApiResult<Json<CountResponse>> {
    let count = state.backend.global_unread_count(&user).await?;
    Ok(Json(CountResponse { count }))
}

/// `GET /v1/unread/conversations`
pub async fn per_conversation(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> ApiResult<Json<UnreadCounts>> {
    Ok(Json(state.backend.per_conversation_unread_counts(&user).await?))
}

/// `GET /v1/chats`
pub async fn chats(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(state.backend.list_conversations(&user).await?))
}
