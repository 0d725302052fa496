//! Attachment upload.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chat_core::wire::FILE_NAME_HEADER;
use chat_core::{AttachmentPayload, UploadedAttachment};
use tracing::info;

use crate::error::ApiResult;
use crate::state::{AppState, Identity};

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// File names arrive percent-encoded so non-ASCII names survive the header.
fn decode_file_name(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|name| name.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// `POST /v1/conversations/:booking_id/attachments`
///
/// The body is the raw file. `content-type` and `x-file-name` describe it.
pub async fn upload(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(booking_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UploadedAttachment>)> {
    let payload = AttachmentPayload::new(
        header(&headers, FILE_NAME_HEADER)
            .map(|name| decode_file_name(&name))
            .unwrap_or_else(|| "upload".to_string()),
        header(&headers, CONTENT_TYPE.as_str()),
        body.to_vec(),
    );

    let uploaded = state.backend.upload(&booking_id, &user, payload).await?;
    info!(
        conversation_id = %booking_id,
        size = uploaded.size,
        mime = %uploaded.mime,
        "Attachment uploaded"
    );
    Ok((StatusCode::CREATED, Json(uploaded)))
}
