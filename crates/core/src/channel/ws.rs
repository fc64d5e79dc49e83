//! WebSocket status channel transport.

use async_trait::async_trait;
use futures::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::config::WsChannelConfig;

use super::{ChannelError, StatusStream, StatusTransport};

/// Status channel transport over a WebSocket to the payment gateway.
///
/// The gateway exposes one endpoint per reservation:
/// `<base url>/<reservation_id>`.
pub struct WsStatusTransport {
    config: WsChannelConfig,
}

impl WsStatusTransport {
    /// Create a transport with the given configuration.
    pub fn new(config: WsChannelConfig) -> Self {
        Self { config }
    }

    fn channel_url(&self, reservation_id: &str) -> String {
        format!(
            "{}/{}",
            self.config.url.trim_end_matches('/'),
            reservation_id
        )
    }
}

#[async_trait]
impl StatusTransport for WsStatusTransport {
    async fn open(&self, reservation_id: &str) -> Result<StatusStream, ChannelError> {
        let url = self.channel_url(reservation_id);
        debug!(%url, "Opening payment status channel");

        let (socket, _response) = connect_async(&url)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        let (_write, read) = socket.split();

        let stream = read.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_string())),
                Ok(Message::Close(_)) => Some(Err(ChannelError::Closed)),
                // Pings/pongs/binary frames carry no status payload.
                Ok(_) => None,
                Err(e) => Some(Err(ChannelError::Transport(e.to_string()))),
            }
        });

        Ok(Box::pin(stream))
    }
}
