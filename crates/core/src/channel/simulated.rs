//! Simulated status channel for environments without a live gateway.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tokio::time::Duration;
use tracing::debug;

use crate::config::{SimulatedChannelConfig, SimulatedOutcome};
use crate::reservation::{PaymentStatus, StatusEvent};

use super::{ChannelError, StatusStream, StatusTransport};

/// Transport that synthesizes a plausible payment status progression.
///
/// Emits `waiting_payment -> payment_received -> processing -> completed`
/// (or `failed`, per configuration) with a fixed delay and optional jitter
/// between steps. Swappable with the live WebSocket transport without
/// changing the coordinator's contract.
pub struct SimulatedStatusTransport {
    config: SimulatedChannelConfig,
}

impl SimulatedStatusTransport {
    /// Create a transport with the given configuration.
    pub fn new(config: SimulatedChannelConfig) -> Self {
        Self { config }
    }

    fn step_delay(&self) -> Duration {
        let jitter = if self.config.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(self.config.step_delay_ms + jitter)
    }

    fn progression(&self) -> Vec<PaymentStatus> {
        let terminal = match self.config.outcome {
            SimulatedOutcome::Completed => PaymentStatus::Completed,
            SimulatedOutcome::Failed => PaymentStatus::Failed,
        };
        vec![
            PaymentStatus::WaitingPayment,
            PaymentStatus::PaymentReceived,
            PaymentStatus::Processing,
            terminal,
        ]
    }
}

#[async_trait]
impl StatusTransport for SimulatedStatusTransport {
    async fn open(&self, reservation_id: &str) -> Result<StatusStream, ChannelError> {
        debug!(%reservation_id, "Opening simulated payment status channel");

        let steps: Vec<(Duration, PaymentStatus)> = self
            .progression()
            .into_iter()
            .map(|status| (self.step_delay(), status))
            .collect();

        let stream = futures::stream::unfold(steps.into_iter(), |mut steps| async move {
            let (delay, status) = steps.next()?;
            tokio::time::sleep(delay).await;
            let event = StatusEvent::payment_status(status, Utc::now());
            let frame = serde_json::to_string(&event)
                .map_err(|e| ChannelError::Transport(e.to_string()));
            Some((frame, steps))
        });

        Ok(Box::pin(stream))
    }
}
