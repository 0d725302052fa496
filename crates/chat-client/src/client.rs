//! Chat server HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use chat_core::wire::{CountResponse, SendMessageRequest, FILE_NAME_HEADER, USER_ID_HEADER};
use chat_core::{
    AttachmentPayload, ChatBackend, ChatError, ConversationEvent, ConversationSummary,
    EventStream, InboxReason, InboxSignal, Message, MessageContent, ResolvedConversation,
    Result as ChatResult, TypingSignal, UnreadCounts, UploadedAttachment,
};
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::sse::SseStream;

/// SSE event names used by the server.
const MESSAGE_EVENT: &str = "message";
const TYPING_EVENT: &str = "typing";
const INBOX_EVENT: &str = "inbox";

/// Client for one user of a chat server.
///
/// Implements [`ChatBackend`], so a conversation session can run against a
/// remote server exactly as it does in-process. Calls naming any other user
/// than the configured one are refused locally.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    // Event streams are long-lived and must not time out.
    sse_http: Client,
    config: Arc<ClientConfig>,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.config.base_url)
            .field("user_id", &self.config.user_id)
            .finish()
    }
}

impl ChatClient {
    /// Create a client without contacting the server.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.user_id.trim().is_empty() {
            return Err(ClientError::Config("user_id must not be empty".to_string()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Http)?;
        let sse_http = Client::builder().build().map_err(ClientError::Http)?;

        Ok(Self {
            http,
            sse_http,
            config: Arc::new(config),
        })
    }

    /// Create a client and verify the server answers its health check.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let client = Self::new(config)?;
        if !client.health_check().await? {
            return Err(ClientError::HealthCheckFailed);
        }
        info!(
            base_url = %client.config.base_url,
            user_id = %client.config.user_id,
            "Connected to chat server"
        );
        Ok(client)
    }

    /// Perform a health check against the server.
    pub async fn health_check(&self) -> Result<bool, ClientError> {
        let url = self.config.health_url();
        debug!("Health check: {}", url);
        let resp = self.http.get(&url).send().await?;
        Ok(resp.status().is_success())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The user this client acts as.
    pub fn user_id(&self) -> &str {
        &self.config.user_id
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header(USER_ID_HEADER, &self.config.user_id);
        match &self.config.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.authorize(self.http.request(method, url))
    }

    fn acting_as(&self, user_id: &str) -> Result<(), ChatError> {
        if user_id == self.config.user_id {
            Ok(())
        } else {
            Err(ChatError::AccessDenied(format!(
                "client acts as {}, not {}",
                self.config.user_id, user_id
            )))
        }
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ClientError::from_response(response).await)
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ChatResult<T> {
        let response = Self::check(builder.send().await.map_err(ClientError::from)?).await?;
        Ok(response.json::<T>().await.map_err(ClientError::from)?)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> ChatResult<()> {
        Self::check(builder.send().await.map_err(ClientError::from)?).await?;
        Ok(())
    }

    async fn open_stream<T>(
        &self,
        url: &str,
        event_name: &'static str,
        on_reconnect: Option<T>,
    ) -> ChatResult<EventStream<T>>
    where
        T: DeserializeOwned + Clone + Unpin + Send + 'static,
    {
        let request = self.authorize(self.sse_http.get(url));
        let stream =
            SseStream::open(request, event_name, &self.config.reconnect, on_reconnect).await?;
        Ok(stream.boxed())
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn resolve_conversation(
        &self,
        booking_id: &str,
        user_id: &str,
    ) -> ChatResult<ResolvedConversation> {
        self.acting_as(user_id)?;
        let url = self.config.conversation_url(booking_id, None);
        self.send_json(self.request(Method::GET, &url)).await
    }

    async fn fetch_history(&self, conversation_id: &str, user_id: &str) -> ChatResult<Vec<Message>> {
        self.acting_as(user_id)?;
        let url = self.config.conversation_url(conversation_id, Some("messages"));
        self.send_json(self.request(Method::GET, &url)).await
    }

    async fn fetch_history_after(
        &self,
        conversation_id: &str,
        user_id: &str,
        after_id: i64,
        limit: u32,
    ) -> ChatResult<Vec<Message>> {
        self.acting_as(user_id)?;
        let url = self.config.conversation_url(conversation_id, Some("messages"));
        let request = self
            .request(Method::GET, &url)
            .query(&[("after", after_id.to_string()), ("limit", limit.to_string())]);
        self.send_json(request).await
    }

    async fn append(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: MessageContent,
    ) -> ChatResult<Message> {
        self.acting_as(sender_id)?;
        let url = self.config.conversation_url(conversation_id, Some("messages"));
        let request = self
            .request(Method::POST, &url)
            .json(&SendMessageRequest::from_content(&content));
        self.send_json(request).await
    }

    async fn mark_read(&self, conversation_id: &str, user_id: &str) -> ChatResult<Vec<Message>> {
        self.acting_as(user_id)?;
        let url = self.config.conversation_url(conversation_id, Some("read"));
        self.send_json(self.request(Method::POST, &url)).await
    }

    async fn delete_own(&self, message_id: i64, user_id: &str) -> ChatResult<()> {
        self.acting_as(user_id)?;
        let url = self.config.message_url(message_id);
        self.send_empty(self.request(Method::DELETE, &url)).await
    }

    async fn delete_conversation(&self, conversation_id: &str, user_id: &str) -> ChatResult<u64> {
        self.acting_as(user_id)?;
        let url = self.config.conversation_url(conversation_id, Some("messages"));
        let deleted: CountResponse = self.send_json(self.request(Method::DELETE, &url)).await?;
        Ok(deleted.count)
    }

    async fn upload(
        &self,
        conversation_id: &str,
        sender_id: &str,
        payload: AttachmentPayload,
    ) -> ChatResult<UploadedAttachment> {
        self.acting_as(sender_id)?;
        let url = self.config.conversation_url(conversation_id, Some("attachments"));
        let request = self
            .request(Method::POST, &url)
            .header(CONTENT_TYPE, payload.mime())
            .header(
                FILE_NAME_HEADER,
                urlencoding::encode(&payload.file_name).into_owned(),
            )
            .body(payload.bytes);
        self.send_json(request).await
    }

    async fn send_typing(&self, conversation_id: &str, user_id: &str) -> ChatResult<()> {
        self.acting_as(user_id)?;
        let url = self.config.conversation_url(conversation_id, Some("typing"));
        self.send_empty(self.request(Method::POST, &url)).await
    }

    async fn subscribe_messages(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> ChatResult<EventStream<ConversationEvent>> {
        self.acting_as(user_id)?;
        let url = self.config.conversation_url(conversation_id, Some("events"));
        let resync = ConversationEvent::Resync {
            conversation_id: conversation_id.to_string(),
        };
        self.open_stream(&url, MESSAGE_EVENT, Some(resync)).await
    }

    async fn subscribe_typing(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> ChatResult<EventStream<TypingSignal>> {
        self.acting_as(user_id)?;
        let url = self.config.conversation_url(conversation_id, Some("events"));
        self.open_stream(&url, TYPING_EVENT, None).await
    }

    async fn subscribe_inbox(&self, user_id: &str) -> ChatResult<EventStream<InboxSignal>> {
        self.acting_as(user_id)?;
        let url = self.config.user_url("inbox/events");
        let resync = InboxSignal {
            user_id: user_id.to_string(),
            conversation_id: None,
            reason: InboxReason::Resync,
        };
        self.open_stream(&url, INBOX_EVENT, Some(resync)).await
    }

    async fn global_unread_count(&self, user_id: &str) -> ChatResult<u64> {
        self.acting_as(user_id)?;
        let url = self.config.user_url("unread");
        let unread: CountResponse = self.send_json(self.request(Method::GET, &url)).await?;
        Ok(unread.count)
    }

    async fn per_conversation_unread_counts(&self, user_id: &str) -> ChatResult<UnreadCounts> {
        self.acting_as(user_id)?;
        let url = self.config.user_url("unread/conversations");
        self.send_json(self.request(Method::GET, &url)).await
    }

    async fn list_conversations(&self, user_id: &str) -> ChatResult<Vec<ConversationSummary>> {
        self.acting_as(user_id)?;
        let url = self.config.user_url("chats");
        self.send_json(self.request(Method::GET, &url)).await
    }

    fn name(&self) -> &str {
        "http-client"
    }
}
