//! Status channel adapter owned by the reservation coordinator.

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::coordinator::{CoordinatorMessage, SignalTx};
use crate::metrics::{STATUS_CHANNEL_ERRORS, STATUS_EVENTS_DEDUPED};
use crate::reservation::StatusEvent;

use super::dedup::DedupCache;
use super::{ChannelError, StatusTransport};

/// Explicit connection lifecycle, checked as a precondition on `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct ReaderHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Per-reservation connection object for the payment status channel.
///
/// Owned and mutated exclusively by the coordinator task, so the connection
/// guard is a plain state check rather than shared mutable flags. Delivers a
/// deduplicated, ordered sequence of status events into the coordinator
/// queue.
pub struct ChannelAdapter {
    transport: Arc<dyn StatusTransport>,
    dedup_ttl: Duration,
    state: ConnectionState,
    reader: Option<ReaderHandle>,
}

impl ChannelAdapter {
    /// Create a disconnected adapter over the given transport.
    pub fn new(transport: Arc<dyn StatusTransport>, dedup_ttl: Duration) -> Self {
        Self {
            transport,
            dedup_ttl,
            state: ConnectionState::Disconnected,
            reader: None,
        }
    }

    /// Whether a connection is currently open (or being opened).
    pub fn is_connected(&self) -> bool {
        self.state != ConnectionState::Disconnected
    }

    /// Connect for one reservation attempt and start forwarding events.
    ///
    /// Connecting while already connecting or connected is rejected with
    /// `AlreadyConnected` and must not open a second connection. The dedup
    /// set starts empty on every successful connect, so a retried
    /// reservation gets a clean slate.
    pub(crate) async fn connect(
        &mut self,
        reservation_id: &str,
        attempt: u32,
        tx: SignalTx,
    ) -> Result<(), ChannelError> {
        if self.state != ConnectionState::Disconnected {
            warn!(%reservation_id, "Ignoring connect: status channel already open");
            return Err(ChannelError::AlreadyConnected);
        }

        self.state = ConnectionState::Connecting;
        let stream = match self.transport.open(reservation_id).await {
            Ok(stream) => stream,
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                STATUS_CHANNEL_ERRORS.inc();
                return Err(e);
            }
        };

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let dedup = DedupCache::new(self.dedup_ttl);
        let task = tokio::spawn(read_loop(stream, dedup, attempt, tx, cancel_rx));

        self.reader = Some(ReaderHandle {
            cancel: cancel_tx,
            task,
        });
        self.state = ConnectionState::Connected;
        debug!(%reservation_id, attempt, "Status channel connected");

        Ok(())
    }

    /// Disconnect. Safe to call any number of times, connected or not.
    pub fn disconnect(&mut self) {
        if let Some(reader) = self.reader.take() {
            let _ = reader.cancel.send(true);
            reader.task.abort();
            debug!("Status channel disconnected");
        }
        self.state = ConnectionState::Disconnected;
    }
}

impl Drop for ChannelAdapter {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Forward deduplicated status events until canceled or the stream ends.
async fn read_loop(
    mut stream: super::StatusStream,
    mut dedup: DedupCache,
    attempt: u32,
    tx: SignalTx,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let reason = loop {
        tokio::select! {
            _ = cancel_rx.changed() => break None,
            frame = stream.next() => match frame {
                None => break Some("stream ended".to_string()),
                Some(Err(e)) => {
                    STATUS_CHANNEL_ERRORS.inc();
                    break Some(e.to_string());
                }
                Some(Ok(text)) => {
                    let Some(event) = parse_frame(&text) else {
                        continue;
                    };
                    let key = event.dedup_key();
                    if !dedup.insert(&key) {
                        debug!(%key, "Dropping duplicate status event");
                        STATUS_EVENTS_DEDUPED.inc();
                        continue;
                    }
                    if tx
                        .send(CoordinatorMessage::Status { attempt, event })
                        .await
                        .is_err()
                    {
                        // Coordinator is gone.
                        break None;
                    }
                }
            }
        }
    };

    // A dropped channel is not a failure; the deadline timer remains the
    // backstop. Just let the coordinator know the connection is gone.
    if let Some(reason) = reason {
        let _ = tx
            .send(CoordinatorMessage::ChannelClosed { attempt, reason })
            .await;
    }
}

/// Parse a raw frame into a status event.
///
/// Unrecognized `type` values and malformed frames are ignored, never
/// errors.
fn parse_frame(text: &str) -> Option<StatusEvent> {
    match serde_json::from_str::<StatusEvent>(text) {
        Ok(event) if event.kind == "payment_status" => Some(event),
        Ok(event) => {
            debug!(kind = %event.kind, "Ignoring status frame of unrecognized type");
            None
        }
        Err(e) => {
            warn!("Ignoring malformed status frame: {}", e);
            STATUS_CHANNEL_ERRORS.inc();
            None
        }
    }
}
