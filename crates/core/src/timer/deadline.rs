//! Cancelable single-fire deadline timer for the payment window.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use crate::coordinator::{CoordinatorMessage, SignalTx};

/// Errors from timer operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    /// A timer is already counting down; callers must cancel first. Enforces
    /// the single-timer-per-reservation invariant.
    #[error("deadline timer already running")]
    AlreadyRunning,
}

/// One countdown bound to one reservation attempt.
///
/// Emits a `CountdownTick` once per second and exactly one `DeadlineExpired`
/// unless canceled first. Cancellation is effective immediately for future
/// signals; a tick already sitting in the coordinator queue may still be
/// delivered once and is discarded there by the attempt/phase guard.
pub struct DeadlineTimer {
    tx: SignalTx,
    cancel: Option<watch::Sender<bool>>,
}

impl DeadlineTimer {
    /// Create an inactive timer that will signal into the given queue.
    pub(crate) fn new(tx: SignalTx) -> Self {
        Self { tx, cancel: None }
    }

    /// Whether a countdown is currently active.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Start the countdown for the given attempt.
    ///
    /// Starting while a countdown is active is an error, not an implicit
    /// restart.
    pub fn start(&mut self, window: Duration, attempt: u32) -> Result<(), TimerError> {
        if self.cancel.is_some() {
            return Err(TimerError::AlreadyRunning);
        }

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        self.cancel = Some(cancel_tx);

        let tx = self.tx.clone();
        let mut remaining = window.as_secs() as u32;

        tokio::spawn(async move {
            debug!(attempt, window_secs = remaining, "Deadline timer started");
            loop {
                tokio::select! {
                    // Canceled, or the timer handle was dropped.
                    _ = cancel_rx.changed() => {
                        debug!(attempt, "Deadline timer canceled");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {
                        remaining = remaining.saturating_sub(1);
                        if remaining == 0 {
                            let _ = tx.send(CoordinatorMessage::DeadlineExpired { attempt }).await;
                            debug!(attempt, "Deadline timer expired");
                            break;
                        }
                        if tx
                            .send(CoordinatorMessage::CountdownTick {
                                attempt,
                                remaining_secs: remaining,
                            })
                            .await
                            .is_err()
                        {
                            // Coordinator is gone; nobody left to signal.
                            break;
                        }
                    }
                }
            }
        });

        Ok(())
    }

    /// Cancel the countdown. Safe to call when inactive or already expired.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn drain_signals(
        rx: &mut mpsc::Receiver<CoordinatorMessage>,
    ) -> (Vec<u32>, usize) {
        let mut ticks = Vec::new();
        let mut expirations = 0;
        while let Ok(msg) = rx.try_recv() {
            match msg {
                CoordinatorMessage::CountdownTick { remaining_secs, .. } => {
                    ticks.push(remaining_secs)
                }
                CoordinatorMessage::DeadlineExpired { .. } => expirations += 1,
                _ => {}
            }
        }
        (ticks, expirations)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_then_single_expiry() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut timer = DeadlineTimer::new(tx);
        timer.start(Duration::from_secs(3), 1).unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;

        let (ticks, expirations) = drain_signals(&mut rx);
        assert_eq!(ticks, vec![2, 1]);
        assert_eq!(expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_all_signals() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut timer = DeadlineTimer::new(tx);
        timer.start(Duration::from_secs(10), 1).unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        timer.cancel();
        let _ = drain_signals(&mut rx);

        tokio::time::sleep(Duration::from_secs(20)).await;
        let (ticks, expirations) = drain_signals(&mut rx);
        assert!(ticks.is_empty());
        assert_eq!(expirations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_active_is_rejected() {
        let (tx, _rx) = mpsc::channel(64);
        let mut timer = DeadlineTimer::new(tx);
        timer.start(Duration::from_secs(10), 1).unwrap();

        let err = timer.start(Duration::from_secs(10), 2).unwrap_err();
        assert_eq!(err, TimerError::AlreadyRunning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_cancel_is_allowed() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut timer = DeadlineTimer::new(tx);
        timer.start(Duration::from_secs(10), 1).unwrap();
        timer.cancel();
        assert!(!timer.is_active());

        timer.start(Duration::from_secs(2), 2).unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        let (_, expirations) = drain_signals(&mut rx);
        assert_eq!(expirations, 1);
    }
}
