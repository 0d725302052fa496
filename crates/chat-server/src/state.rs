//! Application state shared across handlers.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chat_core::wire::USER_ID_HEADER;
use chat_core::ChatBackend;

use crate::error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The chat backend every request goes through.
    pub backend: Arc<dyn ChatBackend>,
    /// Shared bearer token, if required.
    pub api_token: Option<String>,
}

impl AppState {
    /// Create new application state.
    pub fn new(backend: Arc<dyn ChatBackend>, api_token: Option<String>) -> Self {
        Self { backend, api_token }
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(());
    };

    let Some(value) = headers.get(AUTHORIZATION) else {
        return Err(ApiError::Unauthorized("missing bearer token"));
    };

    let Ok(value) = value.to_str() else {
        return Err(ApiError::Unauthorized("malformed authorization header"));
    };

    let token = value.strip_prefix("Bearer ").unwrap_or(value);
    if token != expected {
        return Err(ApiError::Unauthorized("invalid bearer token"));
    }

    Ok(())
}

/// The acting user, taken from the identity header after the token check.
#[derive(Debug, Clone)]
pub struct Identity(pub String);

#[async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        authorize(state, &parts.headers)?;

        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .map(|user| Identity(user.to_string()))
            .ok_or(ApiError::Unauthorized("missing x-user-id header"))
    }
}
