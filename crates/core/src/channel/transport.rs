//! Status channel transport trait.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// Errors from the status channel.
///
/// All of these are non-fatal for the reservation: a channel error never
/// flips the phase, only an explicit `failed` event or the deadline timer
/// does.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// `connect` while already connecting or connected. Logged and ignored
    /// by the coordinator; a second connection is never opened.
    #[error("status channel connection already open")]
    AlreadyConnected,

    /// Opening the channel failed.
    #[error("failed to open status channel: {0}")]
    Connect(String),

    /// The underlying transport reported an error mid-stream.
    #[error("status channel transport error: {0}")]
    Transport(String),

    /// The remote closed the channel.
    #[error("status channel closed by remote")]
    Closed,
}

/// Raw message stream for one reservation's status channel.
pub type StatusStream = BoxStream<'static, Result<String, ChannelError>>;

/// Transport that opens a push stream of raw status frames for a
/// reservation.
///
/// Implementations are swappable without touching the coordinator: a live
/// WebSocket against the payment gateway, or a simulated progression for
/// environments without one.
#[async_trait]
pub trait StatusTransport: Send + Sync {
    /// Open the stream for the given reservation identifier.
    async fn open(&self, reservation_id: &str) -> Result<StatusStream, ChannelError>;
}
