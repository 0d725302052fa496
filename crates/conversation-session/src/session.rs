//! One open conversation, as seen by one participant.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chat_core::{
    AttachmentPayload, ChatBackend, ChatError, ConversationEvent, EventStream, Message,
    MessageContent, ResolvedConversation, TypingSignal, UploadedAttachment,
};
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::timeline::Timeline;

/// Lifecycle of a [`ConversationSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// History is being fetched.
    Loading,
    /// Idle and accepting input.
    Ready,
    /// A text message is in flight.
    Sending,
    /// An attachment is selected and awaiting confirmation or upload.
    Uploading,
    /// The session was closed.
    Closed,
}

/// Errors returned by session operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// The backend refused or failed the operation.
    #[error(transparent)]
    Chat(#[from] ChatError),

    /// The session has been closed.
    #[error("session is closed")]
    Closed,

    /// Another operation holds the session.
    #[error("session is busy ({0:?})")]
    Busy(SessionState),

    /// There is no pending attachment to confirm.
    #[error("no attachment selected")]
    NoPendingAttachment,

    /// There is no pending deletion to confirm.
    #[error("no deletion requested")]
    NoPendingDelete,
}

/// What a confirmed deletion will remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    /// One of the viewer's own messages.
    Message(i64),
    /// The whole thread.
    Conversation,
}

/// Result of a confirmed deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Message(i64),
    /// Number of messages removed.
    Conversation(u64),
}

/// What the viewer sees of a selected attachment before confirming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPreview {
    pub file_name: String,
    pub mime: String,
    pub size: usize,
    /// Set once the upload succeeded; a retry skips straight to sending.
    pub uploaded_url: Option<String>,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub messages: Vec<Message>,
    pub draft: String,
    /// The other participant, while their typing indicator is up.
    pub typing: Option<String>,
    /// Messages that arrived while scrolled away from the bottom.
    pub new_messages: usize,
    /// Messages addressed to the viewer that are still unread.
    pub unread: usize,
    /// False while push delivery is down and the session polls instead.
    pub live: bool,
    pub at_bottom: bool,
    pub last_error: Option<ChatError>,
    pub attachment: Option<AttachmentPreview>,
    pub pending_delete: Option<DeleteTarget>,
}

pub(crate) struct PushStreams {
    pub(crate) messages: EventStream<ConversationEvent>,
    pub(crate) typing: EventStream<TypingSignal>,
}

struct PendingAttachment {
    payload: AttachmentPayload,
    mime: String,
    uploaded: Option<UploadedAttachment>,
}

impl PendingAttachment {
    fn preview(&self) -> AttachmentPreview {
        AttachmentPreview {
            file_name: self.payload.file_name.clone(),
            mime: self.mime.clone(),
            size: self.payload.len(),
            uploaded_url: self.uploaded.as_ref().map(|u| u.url.clone()),
        }
    }
}

struct TypingIndicator {
    user_id: String,
    expires_at: Instant,
}

struct Inner {
    state: SessionState,
    timeline: Timeline,
    draft: String,
    at_bottom: bool,
    new_messages: usize,
    typing: Option<TypingIndicator>,
    live: bool,
    last_error: Option<ChatError>,
    attachment: Option<PendingAttachment>,
    // Taken out of `attachment` while confirm runs.
    attachment_in_flight: bool,
    pending_delete: Option<DeleteTarget>,
}

struct Shared {
    backend: Arc<dyn ChatBackend>,
    conversation: ResolvedConversation,
    viewer_id: String,
    config: SessionConfig,
    inner: Mutex<Inner>,
    version: watch::Sender<u64>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate state and wake watchers.
    fn update<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let result = f(&mut self.lock());
        self.version.send_modify(|v| *v = v.wrapping_add(1));
        result
    }

    fn conversation_id(&self) -> &str {
        &self.conversation.conversation_id
    }

    fn record_error(&self, err: ChatError) {
        self.update(|inner| inner.last_error = Some(err));
    }

    fn typing_deadline(&self) -> Option<Instant> {
        self.lock().typing.as_ref().map(|t| t.expires_at)
    }

    async fn mark_read(self: &Arc<Self>) {
        match self
            .backend
            .mark_read(self.conversation_id(), &self.viewer_id)
            .await
        {
            Ok(updated) => {
                debug!(conversation_id = %self.conversation_id(), count = updated.len(), "Marked read");
                self.update(|inner| {
                    for message in updated {
                        inner.timeline.upsert(message);
                    }
                });
            }
            Err(e) => {
                warn!(conversation_id = %self.conversation_id(), "Mark read failed: {}", e);
                self.record_error(e);
            }
        }
    }

    fn spawn_mark_read(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        tokio::spawn(async move { shared.mark_read().await });
    }

    /// Replace the timeline with a fresh fetch.
    async fn refresh(self: &Arc<Self>) -> Result<(), ChatError> {
        let history = self
            .backend
            .fetch_history(self.conversation_id(), &self.viewer_id)
            .await;

        match history {
            Ok(messages) => {
                let needs_read = self.update(|inner| {
                    inner.timeline.replace_all(messages);
                    inner.at_bottom && inner.timeline.unread_for(&self.viewer_id) > 0
                });
                if needs_read {
                    self.spawn_mark_read();
                }
                Ok(())
            }
            Err(e) => {
                warn!(conversation_id = %self.conversation_id(), "History refresh failed: {}", e);
                self.record_error(e.clone());
                Err(e)
            }
        }
    }

    async fn apply_event(self: &Arc<Self>, event: ConversationEvent) {
        debug!(conversation_id = %self.conversation_id(), "Push event: {:?}", event);
        match event {
            ConversationEvent::Inserted { message } => {
                let needs_read = self.update(|inner| {
                    let from_other = !message.is_from(&self.viewer_id);
                    let unread = message.is_unread_for(&self.viewer_id);
                    let is_new = inner.timeline.upsert(message);

                    if from_other {
                        inner.typing = None;
                    }
                    if !(is_new && unread) {
                        return false;
                    }
                    if inner.at_bottom {
                        true
                    } else {
                        inner.new_messages += 1;
                        false
                    }
                });
                if needs_read {
                    self.spawn_mark_read();
                }
            }
            ConversationEvent::Updated { message } => {
                self.update(|inner| {
                    inner.timeline.upsert(message);
                });
            }
            ConversationEvent::Deleted { message_id, .. } => {
                self.update(|inner| {
                    inner.timeline.remove(message_id);
                    if inner.pending_delete == Some(DeleteTarget::Message(message_id)) {
                        inner.pending_delete = None;
                    }
                });
            }
            ConversationEvent::Cleared { cleared_by, .. } => {
                info!(conversation_id = %self.conversation_id(), cleared_by = %cleared_by, "Conversation cleared");
                self.update(|inner| {
                    inner.timeline.clear();
                    inner.new_messages = 0;
                });
            }
            ConversationEvent::Resync { .. } => {
                let _ = self.refresh().await;
            }
        }
    }

    fn show_typing(&self, signal: TypingSignal) {
        if signal.user_id == self.viewer_id {
            return;
        }
        let expires_at = Instant::now() + self.config.typing_decay;
        self.update(|inner| {
            inner.typing = Some(TypingIndicator {
                user_id: signal.user_id,
                expires_at,
            });
        });
    }

    fn expire_typing(&self) {
        let now = Instant::now();
        let expired = self
            .lock()
            .typing
            .as_ref()
            .is_some_and(|t| t.expires_at <= now);
        if expired {
            self.update(|inner| inner.typing = None);
        }
    }

    fn set_live(&self, live: bool) {
        self.update(|inner| inner.live = live);
    }
}

/// Subscribe to both push streams.
///
/// `Ok(None)` means push is unavailable right now and the caller should poll.
async fn subscribe(
    backend: &dyn ChatBackend,
    conversation_id: &str,
    viewer_id: &str,
) -> Result<Option<PushStreams>, ChatError> {
    let messages = match backend.subscribe_messages(conversation_id, viewer_id).await {
        Ok(stream) => stream,
        Err(e) if e.is_retryable() => {
            warn!(conversation_id = %conversation_id, "Push unavailable, polling instead: {}", e);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let typing = match backend.subscribe_typing(conversation_id, viewer_id).await {
        Ok(stream) => stream,
        Err(e) if e.is_retryable() => {
            warn!(conversation_id = %conversation_id, "Typing unavailable: {}", e);
            futures::stream::pending().boxed()
        }
        Err(e) => return Err(e),
    };

    Ok(Some(PushStreams { messages, typing }))
}

pub(crate) async fn next_or_pending<T>(stream: &mut Option<EventStream<T>>) -> Option<T> {
    match stream {
        Some(s) => s.next().await,
        None => futures::future::pending().await,
    }
}

async fn run_push_loop(
    shared: Arc<Shared>,
    streams: Option<PushStreams>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let (mut messages, mut typing) = match streams {
        Some(s) => (Some(s.messages), Some(s.typing)),
        None => (None, None),
    };

    let period = shared.config.poll_interval.max(Duration::from_millis(10));
    let mut poll = interval_at(Instant::now() + period, period);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut refused = false;

    loop {
        let deadline = shared.typing_deadline();

        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            event = next_or_pending(&mut messages) => match event {
                Some(event) => shared.apply_event(event).await,
                None => {
                    warn!(conversation_id = %shared.conversation_id(), "Push stream ended, polling instead");
                    messages = None;
                    typing = None;
                    shared.set_live(false);
                }
            },

            signal = next_or_pending(&mut typing) => match signal {
                Some(signal) => shared.show_typing(signal),
                None => typing = None,
            },

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                shared.expire_typing();
            }

            _ = poll.tick(), if messages.is_none() && !refused => {
                match subscribe(shared.backend.as_ref(), shared.conversation_id(), &shared.viewer_id).await {
                    Ok(resubscribed) => {
                        let _ = shared.refresh().await;
                        if let Some(streams) = resubscribed {
                            info!(conversation_id = %shared.conversation_id(), "Push delivery restored");
                            messages = Some(streams.messages);
                            typing = Some(streams.typing);
                            shared.set_live(true);
                        }
                    }
                    Err(e) => {
                        warn!(conversation_id = %shared.conversation_id(), "Resubscribe refused, polling stopped: {}", e);
                        shared.record_error(e);
                        refused = true;
                    }
                }
            }
        }
    }

    debug!(conversation_id = %shared.conversation_id(), "Push loop stopped");
}

/// A live view of one conversation for one participant.
///
/// Opening subscribes to pushes, loads history and marks incoming messages
/// read. The session then keeps its timeline current from pushes, falling
/// back to polling while push is unavailable. Drafts, attachments and
/// deletions run through the backend, so every write is re-authorized
/// server-side.
pub struct ConversationSession {
    shared: Arc<Shared>,
    control: Mutex<Option<(oneshot::Sender<()>, JoinHandle<()>)>>,
}

impl std::fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSession")
            .field("conversation_id", &self.shared.conversation.conversation_id)
            .field("viewer_id", &self.shared.viewer_id)
            .field("state", &self.state())
            .finish()
    }
}

impl ConversationSession {
    /// Open a session on `booking_id` for `viewer_id`.
    ///
    /// Fails with `ChatUnavailable` if the booking is not engaged, and with
    /// `AccessDenied` if the viewer is not a participant.
    pub async fn open(
        backend: Arc<dyn ChatBackend>,
        booking_id: &str,
        viewer_id: &str,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let conversation = backend.resolve_conversation(booking_id, viewer_id).await?;
        if !conversation.engaged {
            return Err(ChatError::ChatUnavailable {
                booking_id: conversation.conversation_id,
                status: conversation.status,
            }
            .into());
        }

        // Subscribe before fetching so nothing lands in between.
        let streams = subscribe(backend.as_ref(), booking_id, viewer_id).await?;
        let history = backend.fetch_history(booking_id, viewer_id).await?;

        let session = Self::start(backend, conversation, viewer_id, config, history, streams);
        session.shared.mark_read().await;
        session.shared.update(|inner| inner.state = SessionState::Ready);

        info!(
            conversation_id = %booking_id,
            viewer_id = %viewer_id,
            live = session.is_live(),
            "Conversation session opened"
        );
        Ok(session)
    }

    /// Build the session around already-fetched state and spawn its push loop.
    pub(crate) fn start(
        backend: Arc<dyn ChatBackend>,
        conversation: ResolvedConversation,
        viewer_id: &str,
        config: SessionConfig,
        history: Vec<Message>,
        streams: Option<PushStreams>,
    ) -> Self {
        let (version, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            backend,
            conversation,
            viewer_id: viewer_id.to_string(),
            config,
            inner: Mutex::new(Inner {
                state: SessionState::Loading,
                timeline: Timeline::from_messages(history),
                draft: String::new(),
                at_bottom: true,
                new_messages: 0,
                typing: None,
                live: streams.is_some(),
                last_error: None,
                attachment: None,
                attachment_in_flight: false,
                pending_delete: None,
            }),
            version,
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_push_loop(Arc::clone(&shared), streams, shutdown_rx));

        Self {
            shared,
            control: Mutex::new(Some((shutdown_tx, task))),
        }
    }

    /// The resolved conversation.
    pub fn conversation(&self) -> &ResolvedConversation {
        &self.shared.conversation
    }

    pub fn viewer_id(&self) -> &str {
        &self.shared.viewer_id
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    /// Messages in display order.
    pub fn messages(&self) -> Vec<Message> {
        self.shared.lock().timeline.messages().to_vec()
    }

    pub fn draft(&self) -> String {
        self.shared.lock().draft.clone()
    }

    /// The other participant while their typing indicator is up.
    pub fn typing_user(&self) -> Option<String> {
        let now = Instant::now();
        self.shared
            .lock()
            .typing
            .as_ref()
            .filter(|t| t.expires_at > now)
            .map(|t| t.user_id.clone())
    }

    /// Messages addressed to the viewer that are still unread.
    pub fn unread_count(&self) -> usize {
        self.shared.lock().timeline.unread_for(&self.shared.viewer_id)
    }

    /// Messages that arrived while scrolled away from the bottom.
    pub fn new_message_count(&self) -> usize {
        self.shared.lock().new_messages
    }

    /// Whether push delivery is active.
    pub fn is_live(&self) -> bool {
        self.shared.lock().live
    }

    pub fn last_error(&self) -> Option<ChatError> {
        self.shared.lock().last_error.clone()
    }

    /// Everything at once.
    pub fn snapshot(&self) -> SessionSnapshot {
        let now = Instant::now();
        let inner = self.shared.lock();
        SessionSnapshot {
            state: inner.state,
            messages: inner.timeline.messages().to_vec(),
            draft: inner.draft.clone(),
            typing: inner
                .typing
                .as_ref()
                .filter(|t| t.expires_at > now)
                .map(|t| t.user_id.clone()),
            new_messages: inner.new_messages,
            unread: inner.timeline.unread_for(&self.shared.viewer_id),
            live: inner.live,
            at_bottom: inner.at_bottom,
            last_error: inner.last_error.clone(),
            attachment: inner.attachment.as_ref().map(PendingAttachment::preview),
            pending_delete: inner.pending_delete,
        }
    }

    /// A receiver that ticks on every state change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.version.subscribe()
    }

    /// Wait until `predicate` holds for the current snapshot.
    pub async fn wait_until<F>(&self, mut predicate: F) -> SessionSnapshot
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut changes = self.changes();
        loop {
            let snapshot = self.snapshot();
            if predicate(&snapshot) || changes.changed().await.is_err() {
                return snapshot;
            }
        }
    }

    /// Refetch history on demand.
    pub async fn refresh(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        Ok(self.shared.refresh().await?)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Closed => Err(SessionError::Closed),
            _ => Ok(()),
        }
    }

    /// Replace the draft and broadcast a typing signal.
    pub fn set_draft(&self, text: impl Into<String>) {
        let text = text.into();
        let ready = self.shared.update(|inner| {
            inner.draft = text;
            inner.state == SessionState::Ready
        });
        if !ready {
            return;
        }

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            if let Err(e) = shared
                .backend
                .send_typing(shared.conversation_id(), &shared.viewer_id)
                .await
            {
                debug!("Typing signal not sent: {}", e);
            }
        });
    }

    /// Send the current draft as a text message.
    ///
    /// The draft is cleared immediately and restored if the send fails. Text
    /// typed while the send was in flight is kept after the restored text.
    pub async fn send(&self) -> Result<Message, SessionError> {
        let text = self.shared.update(|inner| {
            match inner.state {
                SessionState::Ready => {}
                SessionState::Closed => return Err(SessionError::Closed),
                other => return Err(SessionError::Busy(other)),
            }
            if inner.draft.trim().is_empty() {
                return Err(ChatError::Validation("message text is empty".to_string()).into());
            }
            inner.state = SessionState::Sending;
            Ok(std::mem::take(&mut inner.draft))
        })?;

        let result = self
            .detached_append(MessageContent::text(text.clone()))
            .await;

        self.shared.update(|inner| {
            if inner.state == SessionState::Sending {
                inner.state = SessionState::Ready;
            }
            match &result {
                Ok(message) => {
                    inner.timeline.upsert(message.clone());
                    inner.last_error = None;
                }
                Err(e) => {
                    inner.draft = if inner.draft.trim().is_empty() {
                        text
                    } else {
                        format!("{} {}", text.trim_end(), inner.draft.trim_start())
                    };
                    inner.last_error = Some(e.clone());
                }
            }
        });

        match result {
            Ok(message) => Ok(message),
            Err(e) => {
                error!(conversation_id = %self.shared.conversation_id(), "Send failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Run an append on its own task so closing the session cannot cancel it.
    async fn detached_append(&self, content: MessageContent) -> Result<Message, ChatError> {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared
                .backend
                .append(shared.conversation_id(), &shared.viewer_id, content)
                .await
        })
        .await
        .unwrap_or_else(|e| Err(ChatError::Transport(format!("send task failed: {}", e))))
    }

    /// Select an image to send. Checks type and size locally.
    pub fn select_attachment(
        &self,
        payload: AttachmentPayload,
    ) -> Result<AttachmentPreview, SessionError> {
        let max_bytes = self.shared.config.max_attachment_bytes;
        self.shared.update(|inner| {
            match inner.state {
                SessionState::Ready => {}
                SessionState::Closed => return Err(SessionError::Closed),
                other => return Err(SessionError::Busy(other)),
            }
            let mime = payload.check(max_bytes).map_err(ChatError::from)?;
            let pending = PendingAttachment {
                payload,
                mime,
                uploaded: None,
            };
            let preview = pending.preview();
            inner.attachment = Some(pending);
            inner.state = SessionState::Uploading;
            Ok(preview)
        })
    }

    /// Drop the selected attachment without touching the backend.
    pub fn cancel_attachment(&self) {
        self.shared.update(|inner| {
            inner.attachment = None;
            if inner.state == SessionState::Uploading {
                inner.state = SessionState::Ready;
            }
        });
    }

    /// Upload the selected attachment and send it.
    ///
    /// On failure the selection is kept, so calling this again retries. If
    /// the upload already succeeded only the send is repeated.
    pub async fn confirm_attachment(&self) -> Result<Message, SessionError> {
        let mut pending = self.shared.update(|inner| {
            if inner.state == SessionState::Closed {
                return Err(SessionError::Closed);
            }
            if inner.attachment_in_flight {
                return Err(SessionError::Busy(inner.state));
            }
            let pending = inner
                .attachment
                .take()
                .ok_or(SessionError::NoPendingAttachment)?;
            inner.attachment_in_flight = true;
            Ok(pending)
        })?;

        let uploaded = match pending.uploaded.clone() {
            Some(uploaded) => uploaded,
            None => match self.detached_upload(pending.payload.clone()).await {
                Ok(uploaded) => {
                    pending.uploaded = Some(uploaded.clone());
                    uploaded
                }
                Err(e) => return Err(self.restore_attachment(pending, e)),
            },
        };

        match self.detached_append(uploaded.to_content()).await {
            Ok(message) => {
                self.shared.update(|inner| {
                    inner.attachment_in_flight = false;
                    inner.timeline.upsert(message.clone());
                    inner.last_error = None;
                    if inner.state == SessionState::Uploading {
                        inner.state = SessionState::Ready;
                    }
                });
                Ok(message)
            }
            Err(e) => Err(self.restore_attachment(pending, e)),
        }
    }

    async fn detached_upload(
        &self,
        payload: AttachmentPayload,
    ) -> Result<UploadedAttachment, ChatError> {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared
                .backend
                .upload(shared.conversation_id(), &shared.viewer_id, payload)
                .await
        })
        .await
        .unwrap_or_else(|e| Err(ChatError::UploadFailed(format!("upload task failed: {}", e))))
    }

    fn restore_attachment(&self, pending: PendingAttachment, err: ChatError) -> SessionError {
        warn!(
            conversation_id = %self.shared.conversation_id(),
            uploaded = pending.uploaded.is_some(),
            "Attachment not sent: {}",
            err
        );
        self.shared.update(|inner| {
            inner.attachment_in_flight = false;
            // A cancel while in flight wins.
            if inner.state == SessionState::Uploading {
                inner.attachment = Some(pending);
            }
            inner.last_error = Some(err.clone());
        });
        err.into()
    }

    /// Tell the session whether the viewer is looking at the newest message.
    ///
    /// Reaching the bottom marks everything read and resets the new-message
    /// count.
    pub async fn set_at_bottom(&self, at_bottom: bool) {
        let needs_read = self.shared.update(|inner| {
            inner.at_bottom = at_bottom;
            if !at_bottom {
                return false;
            }
            inner.new_messages = 0;
            inner.state != SessionState::Closed
                && inner.timeline.unread_for(&self.shared.viewer_id) > 0
        });
        if needs_read {
            self.shared.mark_read().await;
        }
    }

    /// Ask to delete one of the viewer's own messages. Nothing happens until
    /// [`confirm_delete`](Self::confirm_delete).
    pub fn request_delete_message(&self, message_id: i64) -> Result<(), SessionError> {
        let viewer = &self.shared.viewer_id;
        self.shared.update(|inner| {
            if inner.state == SessionState::Closed {
                return Err(SessionError::Closed);
            }
            let message = inner
                .timeline
                .get(message_id)
                .ok_or_else(|| ChatError::not_found("Message", message_id.to_string()))?;
            if !message.is_from(viewer) {
                return Err(ChatError::Forbidden(format!(
                    "message {} was not sent by {}",
                    message_id, viewer
                ))
                .into());
            }
            inner.pending_delete = Some(DeleteTarget::Message(message_id));
            Ok(())
        })
    }

    /// Ask to wipe the whole conversation.
    pub fn request_clear_conversation(&self) -> Result<(), SessionError> {
        self.shared.update(|inner| {
            if inner.state == SessionState::Closed {
                return Err(SessionError::Closed);
            }
            inner.pending_delete = Some(DeleteTarget::Conversation);
            Ok(())
        })
    }

    pub fn cancel_delete(&self) {
        self.shared.update(|inner| inner.pending_delete = None);
    }

    /// Carry out the requested deletion.
    pub async fn confirm_delete(&self) -> Result<DeleteOutcome, SessionError> {
        let target = self.shared.update(|inner| {
            if inner.state == SessionState::Closed {
                return Err(SessionError::Closed);
            }
            inner.pending_delete.take().ok_or(SessionError::NoPendingDelete)
        })?;

        let backend = &self.shared.backend;
        let viewer = &self.shared.viewer_id;
        let result = match target {
            DeleteTarget::Message(id) => backend
                .delete_own(id, viewer)
                .await
                .map(|()| DeleteOutcome::Message(id)),
            DeleteTarget::Conversation => backend
                .delete_conversation(self.shared.conversation_id(), viewer)
                .await
                .map(DeleteOutcome::Conversation),
        };

        match result {
            Ok(outcome) => {
                self.shared.update(|inner| match outcome {
                    DeleteOutcome::Message(id) => {
                        inner.timeline.remove(id);
                    }
                    DeleteOutcome::Conversation(_) => {
                        inner.timeline.clear();
                        inner.new_messages = 0;
                    }
                });
                Ok(outcome)
            }
            Err(e) => {
                warn!(conversation_id = %self.shared.conversation_id(), "Delete failed: {}", e);
                self.shared.record_error(e.clone());
                Err(e.into())
            }
        }
    }

    /// Stop the push loop and release its subscriptions.
    ///
    /// In-flight sends run to completion.
    pub async fn close(&self) {
        self.shared.update(|inner| {
            inner.state = SessionState::Closed;
            inner.typing = None;
        });

        let control = self
            .control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((shutdown, task)) = control {
            let _ = shutdown.send(());
            if let Err(e) = task.await {
                warn!("Push loop ended abnormally: {}", e);
            }
            info!(conversation_id = %self.shared.conversation_id(), "Conversation session closed");
        }
    }
}

impl Drop for ConversationSession {
    fn drop(&mut self) {
        let control = self
            .control
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((_, task)) = control {
            task.abort();
        }
    }
}
