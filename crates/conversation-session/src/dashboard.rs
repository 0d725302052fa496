//! Live unread counts for the dashboard badge and conversation list.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chat_core::{ChatBackend, ChatError, EventStream, InboxSignal, UnreadCounts};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::session::next_or_pending;

/// Last-known unread counts for one user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnreadSnapshot {
    /// Unread messages across every conversation.
    pub global: u64,
    /// Unread messages per conversation. Conversations with none are absent.
    pub per_conversation: UnreadCounts,
    /// Whether a refresh has ever succeeded.
    pub loaded: bool,
    /// Set when the latest refresh failed; the counts are the last good ones.
    pub stale: bool,
    pub last_error: Option<ChatError>,
}

impl UnreadSnapshot {
    /// Unread count for one conversation.
    pub fn for_conversation(&self, conversation_id: &str) -> u64 {
        self.per_conversation
            .get(conversation_id)
            .copied()
            .unwrap_or(0)
    }
}

/// Keeps an [`UnreadSnapshot`] current for one user.
///
/// Counts are refetched whenever the user's inbox signals a change, and on a
/// timer while the inbox subscription is down. Failed refreshes keep the
/// previous counts, mark them stale and retry with backoff.
pub struct UnreadWatcher {
    user_id: String,
    state: watch::Receiver<UnreadSnapshot>,
    refresh_tx: mpsc::UnboundedSender<()>,
    control: Mutex<Option<(oneshot::Sender<()>, JoinHandle<()>)>>,
}

impl std::fmt::Debug for UnreadWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnreadWatcher")
            .field("user_id", &self.user_id)
            .field("snapshot", &*self.state.borrow())
            .finish()
    }
}

impl UnreadWatcher {
    /// Start watching `user_id`'s unread counts.
    pub fn start(backend: Arc<dyn ChatBackend>, user_id: &str, config: SessionConfig) -> Self {
        let (state_tx, state) = watch::channel(UnreadSnapshot::default());
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run_watcher(
            backend,
            user_id.to_string(),
            config,
            state_tx,
            refresh_rx,
            shutdown_rx,
        ));

        Self {
            user_id: user_id.to_string(),
            state,
            refresh_tx,
            control: Mutex::new(Some((shutdown_tx, task))),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The current counts.
    pub fn snapshot(&self) -> UnreadSnapshot {
        self.state.borrow().clone()
    }

    /// A receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<UnreadSnapshot> {
        self.state.clone()
    }

    /// Ask for a refresh now, for example when the dashboard regains focus.
    pub fn refresh(&self) {
        let _ = self.refresh_tx.send(());
    }

    /// Wait until `predicate` holds.
    pub async fn wait_for<F>(&self, predicate: F) -> UnreadSnapshot
    where
        F: FnMut(&UnreadSnapshot) -> bool,
    {
        let mut state = self.state.clone();
        let reached = state.wait_for(predicate).await.map(|snapshot| snapshot.clone());
        reached.unwrap_or_else(|_| self.snapshot())
    }

    /// Stop watching and release the inbox subscription.
    pub async fn stop(&self) {
        let control = self
            .control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((shutdown, task)) = control {
            let _ = shutdown.send(());
            if let Err(e) = task.await {
                warn!("Unread watcher ended abnormally: {}", e);
            }
            info!(user_id = %self.user_id, "Unread watcher stopped");
        }
    }
}

impl Drop for UnreadWatcher {
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

async fn subscribe_inbox(
    backend: &dyn ChatBackend,
    user_id: &str,
) -> Option<EventStream<InboxSignal>> {
    match backend.subscribe_inbox(user_id).await {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!(user_id = %user_id, "Inbox unavailable, polling instead: {}", e);
            None
        }
    }
}

/// Fetch both views of the counts.
///
/// The two reads are separate, so a write landing between them can make
/// them disagree. Returns `true` as the last element when they do.
async fn fetch_counts(
    backend: &dyn ChatBackend,
    user_id: &str,
) -> Result<(u64, UnreadCounts, bool), ChatError> {
    let global = backend.global_unread_count(user_id).await?;
    let per_conversation = backend.per_conversation_unread_counts(user_id).await?;
    let sum: u64 = per_conversation.values().sum();
    Ok((sum, per_conversation, sum != global))
}

async fn run_watcher(
    backend: Arc<dyn ChatBackend>,
    user_id: String,
    config: SessionConfig,
    state: watch::Sender<UnreadSnapshot>,
    mut refresh_rx: mpsc::UnboundedReceiver<()>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let poll_interval = config.poll_interval.max(Duration::from_millis(10));

    // Subscribe before the first fetch so no change slips in between.
    let mut inbox = subscribe_inbox(backend.as_ref(), &user_id).await;
    let mut due = Some(Instant::now());
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            _ = sleep_until(due.unwrap_or_else(Instant::now)), if due.is_some() => {
                if inbox.is_none() {
                    inbox = subscribe_inbox(backend.as_ref(), &user_id).await;
                }

                due = match fetch_counts(backend.as_ref(), &user_id).await {
                    Ok((global, per_conversation, racing)) => {
                        debug!(user_id = %user_id, global, racing, "Unread counts refreshed");
                        attempt = 0;
                        state.send_modify(|s| {
                            s.global = global;
                            s.per_conversation = per_conversation;
                            s.loaded = true;
                            s.stale = false;
                            s.last_error = None;
                        });
                        if racing {
                            Some(Instant::now())
                        } else if inbox.is_none() {
                            Some(Instant::now() + poll_interval)
                        } else {
                            None
                        }
                    }
                    Err(e) => {
                        warn!(user_id = %user_id, attempt, "Unread refresh failed: {}", e);
                        state.send_modify(|s| {
                            s.stale = true;
                            s.last_error = Some(e);
                        });
                        let retry = config.retry.should_retry(attempt).then(|| {
                            Instant::now() + config.retry.delay_for_attempt(attempt)
                        });
                        attempt = attempt.saturating_add(1);
                        retry.or_else(|| inbox.is_none().then(|| Instant::now() + poll_interval))
                    }
                };
            }

            signal = next_or_pending(&mut inbox) => match signal {
                Some(signal) => {
                    debug!(user_id = %user_id, reason = ?signal.reason, "Inbox signal");
                    due = Some(Instant::now());
                }
                None => {
                    warn!(user_id = %user_id, "Inbox stream ended, polling instead");
                    inbox = None;
                    due = Some(Instant::now());
                }
            },

            Some(()) = refresh_rx.recv() => {
                due = Some(Instant::now());
            }
        }
    }

    debug!(user_id = %user_id, "Unread watcher loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::testing::Offline;

    #[tokio::test(start_paused = true)]
    async fn test_failures_mark_stale_without_counts() {
        let config = SessionConfig::default().with_retry(RetryConfig {
            max_retries: Some(2),
            ..RetryConfig::default()
        });
        let watcher = UnreadWatcher::start(Arc::new(Offline::default()), "cust", config);

        let snapshot = watcher.wait_for(|s| s.stale).await;
        assert!(!snapshot.loaded);
        assert_eq!(snapshot.global, 0);
        assert!(matches!(snapshot.last_error, Some(ChatError::Transport(_))));

        watcher.stop().await;
    }

    #[test]
    fn test_for_conversation_defaults_to_zero() {
        let mut snapshot = UnreadSnapshot::default();
        snapshot.per_conversation.insert("b1".into(), 3);
        assert_eq!(snapshot.for_conversation("b1"), 3);
        assert_eq!(snapshot.for_conversation("b2"), 0);
    }
}
