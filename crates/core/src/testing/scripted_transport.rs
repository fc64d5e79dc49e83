//! Scripted status channel transport for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;

use crate::channel::{ChannelError, StatusStream, StatusTransport};
use crate::reservation::{PaymentStatus, StatusEvent};

/// One step of a scripted status channel session.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Wait without emitting anything (keeps the channel open).
    Silence(Duration),
    /// Emit a raw frame after a delay.
    Frame { delay: Duration, text: String },
    /// Emit a transport error after a delay (ends the session).
    Error {
        delay: Duration,
        error: ChannelError,
    },
}

impl ScriptStep {
    /// A well-formed payment status frame.
    pub fn status(delay: Duration, status: PaymentStatus, timestamp: DateTime<Utc>) -> Self {
        let event = StatusEvent::payment_status(status, timestamp);
        Self::Frame {
            delay,
            text: serde_json::to_string(&event).unwrap(),
        }
    }

    /// A raw frame, e.g. malformed JSON or a foreign message type.
    pub fn raw(delay: Duration, text: impl Into<String>) -> Self {
        Self::Frame {
            delay,
            text: text.into(),
        }
    }

    /// Hold the channel open for the given duration.
    pub fn silence(delay: Duration) -> Self {
        Self::Silence(delay)
    }
}

/// Status transport that replays a scripted session per connect.
///
/// Each call to `open` consumes the next queued script; an empty queue
/// yields an immediately-ending stream. Tracks connects for assertions and
/// can be told to refuse the next one.
#[derive(Debug, Default)]
pub struct ScriptedStatusTransport {
    scripts: Arc<RwLock<VecDeque<Vec<ScriptStep>>>>,
    connected_ids: Arc<RwLock<Vec<String>>>,
    fail_next_connect: Arc<RwLock<bool>>,
}

impl ScriptedStatusTransport {
    /// Create a transport with no scripts queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script for the next connect.
    pub async fn push_script(&self, steps: Vec<ScriptStep>) {
        self.scripts.write().await.push_back(steps);
    }

    /// Make the next connect fail.
    pub async fn fail_next_connect(&self) {
        *self.fail_next_connect.write().await = true;
    }

    /// Reservation ids of all successful connects, in order.
    pub async fn connected_ids(&self) -> Vec<String> {
        self.connected_ids.read().await.clone()
    }

    /// Number of successful connects.
    pub async fn connect_count(&self) -> usize {
        self.connected_ids.read().await.len()
    }
}

#[async_trait]
impl StatusTransport for ScriptedStatusTransport {
    async fn open(&self, reservation_id: &str) -> Result<StatusStream, ChannelError> {
        if std::mem::take(&mut *self.fail_next_connect.write().await) {
            return Err(ChannelError::Connect("scripted connect failure".to_string()));
        }

        let steps = self.scripts.write().await.pop_front().unwrap_or_default();
        self.connected_ids
            .write()
            .await
            .push(reservation_id.to_string());

        let stream = futures::stream::unfold(steps.into_iter(), |mut steps| async move {
            loop {
                match steps.next()? {
                    ScriptStep::Silence(delay) => {
                        tokio::time::sleep(delay).await;
                    }
                    ScriptStep::Frame { delay, text } => {
                        tokio::time::sleep(delay).await;
                        return Some((Ok(text), steps));
                    }
                    ScriptStep::Error { delay, error } => {
                        tokio::time::sleep(delay).await;
                        return Some((Err(error), steps));
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
