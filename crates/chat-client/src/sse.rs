//! Server-Sent Events (SSE) streams with automatic reconnection.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{Stream, StreamExt};
use reqwest::RequestBuilder;
use reqwest_eventsource::retry::ExponentialBackoff;
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource, RequestBuilderExt};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::ClientError;

/// Configuration for automatic reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of retries (None = infinite).
    pub max_retries: Option<u32>,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier for each retry.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.min(32) as i32);
        let delay = Duration::from_millis(delay_ms.min(u64::MAX as f64) as u64);
        delay.min(self.max_delay)
    }

    /// Check if we should retry after the given number of attempts.
    pub fn should_retry(&self, attempts: u32) -> bool {
        self.max_retries.map_or(true, |max| attempts < max)
    }

    fn retry_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            self.initial_delay,
            self.backoff_multiplier,
            Some(self.max_delay),
            self.max_retries.map(|max| max as usize),
        )
    }
}

/// One named event type from an SSE endpoint, decoded as `T`.
///
/// The underlying connection reconnects on its own. Every reconnect yields
/// the `on_reconnect` marker, if any, because events may have been missed
/// while disconnected. A refused reconnect ends the stream.
pub(crate) struct SseStream<T> {
    source: EventSource,
    event_name: &'static str,
    on_reconnect: Option<T>,
    done: bool,
}

impl<T> SseStream<T>
where
    T: DeserializeOwned + Clone + Unpin,
{
    /// Connect and wait for the server to accept the stream.
    ///
    /// A refusal is returned with the server's error body, so authorization
    /// failures surface here rather than as an empty stream.
    pub(crate) async fn open(
        request: RequestBuilder,
        event_name: &'static str,
        reconnect: &ReconnectConfig,
        on_reconnect: Option<T>,
    ) -> Result<Self, ClientError> {
        let mut source = request
            .eventsource()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        source.set_retry_policy(Box::new(reconnect.retry_policy()));

        match source.next().await {
            Some(Ok(Event::Open)) => {}
            Some(Ok(Event::Message(msg))) => {
                debug!("Event before open ignored: {}", msg.event);
            }
            Some(Err(EventSourceError::InvalidStatusCode(_, response))) => {
                source.close();
                return Err(ClientError::from_response(response).await);
            }
            Some(Err(e)) => {
                source.close();
                return Err(ClientError::Sse(e.to_string()));
            }
            None => {
                return Err(ClientError::Sse(
                    "event stream closed before opening".to_string(),
                ))
            }
        }

        info!(event = event_name, "SSE connection opened");
        Ok(Self {
            source,
            event_name,
            on_reconnect,
            done: false,
        })
    }

    fn finish(&mut self) {
        self.source.close();
        self.done = true;
    }
}

impl<T> Stream for SseStream<T>
where
    T: DeserializeOwned + Clone + Unpin,
{
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            match Pin::new(&mut this.source).poll_next(cx) {
                Poll::Ready(Some(Ok(Event::Open))) => {
                    info!(event = this.event_name, "SSE connection re-established");
                    if let Some(marker) = this.on_reconnect.clone() {
                        return Poll::Ready(Some(marker));
                    }
                }
                Poll::Ready(Some(Ok(Event::Message(msg)))) => {
                    if msg.event != this.event_name {
                        debug!("Ignoring SSE event type: {}", msg.event);
                        continue;
                    }
                    match serde_json::from_str::<T>(&msg.data) {
                        Ok(item) => return Poll::Ready(Some(item)),
                        Err(e) => {
                            warn!("Failed to parse SSE event data: {}", e);
                            debug!("Raw data: {}", msg.data);
                        }
                    }
                }
                Poll::Ready(Some(Err(EventSourceError::InvalidStatusCode(status, _)))) => {
                    warn!(event = this.event_name, %status, "SSE reconnect refused");
                    this.finish();
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(Err(e))) => {
                    warn!(event = this.event_name, "SSE connection interrupted: {}", e);
                }
                Poll::Ready(None) => {
                    info!(event = this.event_name, "SSE stream ended");
                    this.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_for_attempt_is_capped() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(40), Duration::from_secs(30));
        assert!(config.should_retry(1_000));

        let bounded = ReconnectConfig {
            max_retries: Some(2),
            ..ReconnectConfig::default()
        };
        assert!(bounded.should_retry(1));
        assert!(!bounded.should_retry(2));
    }
}
