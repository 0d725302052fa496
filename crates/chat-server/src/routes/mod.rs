//! Route handlers for the chat API.

pub mod attachments;
pub mod conversations;
pub mod events;
pub mod health;
pub mod unread;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the router with all API routes.
///
/// Attachment bodies may be up to twice `max_upload_bytes` so oversized
/// images reach the uploader and get a proper validation error.
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health::health))
        // One conversation
        .route("/v1/conversations/:booking_id", get(conversations::resolve))
        .route(
            "/v1/conversations/:booking_id/messages",
            get(conversations::history)
                .post(conversations::send)
                .delete(conversations::clear),
        )
        .route("/v1/conversations/:booking_id/read", post(conversations::mark_read))
        .route("/v1/conversations/:booking_id/typing", post(conversations::typing))
        .route(
            "/v1/conversations/:booking_id/attachments",
            post(attachments::upload)
                .layer(DefaultBodyLimit::max(max_upload_bytes.saturating_mul(2))),
        )
        .route(
            "/v1/conversations/:booking_id/events",
            get(events::conversation_events),
        )
        .route("/v1/messages/:message_id", delete(conversations::delete_message))
        // Dashboard
        .route("/v1/unread", get(unread::global))
        .route("/v1/unread/conversations", get(unread::per_conversation))
        .route("/v1/chats", get(unread::chats))
        .route("/v1/inbox/events", get(events::inbox_events))
}
