//! Reservation coordinator implementation.
//!
//! The coordinator is the single authority over a reservation's state. Every
//! input - user commands, deadline timer signals, status channel events -
//! goes through one queue processed by one task, so state mutation is never
//! concurrent with itself and the expired-vs-completed race has a
//! deterministic winner: whichever reaches the queue first.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::channel::{ChannelAdapter, StatusTransport};
use crate::metrics::{
    RESERVATIONS_TERMINAL, RESERVATION_RETRIES, RESERVE_ATTEMPTS, RESERVE_DURATION,
    STALE_SIGNALS_DROPPED, STATUS_EVENTS_APPLIED,
};
use crate::reservation::{
    FailureReason, PaymentStatus, ReservationClient, ReservationPhase, ReservationRequest,
    ReservationSnapshot, ReservationState, ReserveError, StatusEvent,
};
use crate::timer::DeadlineTimer;

use super::config::CoordinatorConfig;
use super::types::{
    CoordinatorError, CoordinatorMessage, ReservationUpdate, ReservationUpdateCallback,
};

/// Builder for a reservation coordinator.
pub struct Coordinator {
    id: String,
    config: CoordinatorConfig,
    client: Arc<dyn ReservationClient>,
    transport: Arc<dyn StatusTransport>,
    update_callback: Option<ReservationUpdateCallback>,
}

impl Coordinator {
    /// Create a coordinator for one checkout session.
    pub fn new(
        id: impl Into<String>,
        config: CoordinatorConfig,
        client: Arc<dyn ReservationClient>,
        transport: Arc<dyn StatusTransport>,
    ) -> Self {
        Self {
            id: id.into(),
            config,
            client,
            transport,
            update_callback: None,
        }
    }

    /// Set a callback invoked on every phase change and countdown tick.
    pub fn with_update_callback(mut self, callback: ReservationUpdateCallback) -> Self {
        self.update_callback = Some(callback);
        self
    }

    /// Spawn the coordinator task and return a handle to it.
    pub fn spawn(self) -> CoordinatorHandle {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);

        let runner = Runner {
            id: self.id.clone(),
            client: self.client,
            state: ReservationState::new(),
            request: None,
            timer: DeadlineTimer::new(tx.clone()),
            channel: ChannelAdapter::new(
                self.transport,
                Duration::from_secs(self.config.dedup_ttl_secs),
            ),
            signal_tx: tx.clone(),
            update_callback: self.update_callback,
            config: self.config,
        };

        let id = self.id;
        tokio::spawn(runner.run(rx));

        CoordinatorHandle { id, tx }
    }
}

/// Handle to a running coordinator. Cloneable; all methods funnel through
/// the coordinator's queue.
#[derive(Clone)]
pub struct CoordinatorHandle {
    id: String,
    tx: mpsc::Sender<CoordinatorMessage>,
}

impl CoordinatorHandle {
    /// Session identifier this coordinator was spawned with.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Reserve tickets and open the payment window.
    ///
    /// Resolves once the booking service answered: with the snapshot in
    /// `AwaitingPayment` (or `Failed` on exhausted inventory), or with an
    /// error for transient faults that made no state machine entry.
    pub async fn reserve(
        &self,
        request: ReservationRequest,
    ) -> Result<ReservationSnapshot, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(CoordinatorMessage::Reserve { request, reply })
            .await
            .map_err(|_| CoordinatorError::Closed)?;
        rx.await.map_err(|_| CoordinatorError::Closed)?
    }

    /// Start a fresh attempt from `Failed` or `Expired`.
    pub async fn retry(&self) -> Result<ReservationSnapshot, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(CoordinatorMessage::Retry { reply })
            .await
            .map_err(|_| CoordinatorError::Closed)?;
        rx.await.map_err(|_| CoordinatorError::Closed)?
    }

    /// Current state snapshot.
    pub async fn snapshot(&self) -> Result<ReservationSnapshot, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(CoordinatorMessage::Snapshot { reply })
            .await
            .map_err(|_| CoordinatorError::Closed)?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    /// Tear down the coordinator: cancel the timer, disconnect the channel
    /// and stop the task. Further calls return `Closed`.
    pub async fn cancel(&self) {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(CoordinatorMessage::Cancel { reply })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

/// The coordinator task state. Only `run` touches it.
struct Runner {
    id: String,
    config: CoordinatorConfig,
    client: Arc<dyn ReservationClient>,
    state: ReservationState,
    request: Option<ReservationRequest>,
    timer: DeadlineTimer,
    channel: ChannelAdapter,
    signal_tx: mpsc::Sender<CoordinatorMessage>,
    update_callback: Option<ReservationUpdateCallback>,
}

impl Runner {
    async fn run(mut self, mut rx: mpsc::Receiver<CoordinatorMessage>) {
        debug!(id = %self.id, "Coordinator started");

        while let Some(msg) = rx.recv().await {
            match msg {
                CoordinatorMessage::Reserve { request, reply } => {
                    let result = self.handle_reserve(request).await;
                    let _ = reply.send(result);
                }
                CoordinatorMessage::Retry { reply } => {
                    let result = self.handle_retry().await;
                    let _ = reply.send(result);
                }
                CoordinatorMessage::Snapshot { reply } => {
                    let _ = reply.send(self.state.snapshot(&self.id));
                }
                CoordinatorMessage::Cancel { reply } => {
                    self.teardown();
                    let _ = reply.send(());
                    break;
                }
                CoordinatorMessage::Status { attempt, event } => {
                    self.handle_status(attempt, event);
                }
                CoordinatorMessage::CountdownTick {
                    attempt,
                    remaining_secs,
                } => {
                    self.handle_tick(attempt, remaining_secs);
                }
                CoordinatorMessage::DeadlineExpired { attempt } => {
                    self.handle_expired(attempt);
                }
                CoordinatorMessage::ChannelClosed { attempt, reason } => {
                    self.handle_channel_closed(attempt, reason);
                }
            }
        }

        // Handle dropped or explicit cancel: either way, nothing may keep
        // running.
        self.teardown();
        debug!(id = %self.id, "Coordinator stopped");
    }

    // ========================================================================
    // Commands
    // ========================================================================

    async fn handle_reserve(
        &mut self,
        request: ReservationRequest,
    ) -> Result<ReservationSnapshot, CoordinatorError> {
        if !matches!(self.state.phase, ReservationPhase::Idle) {
            return Err(self.invalid_transition("reserve"));
        }

        self.request = Some(request);
        self.do_reserve().await
    }

    async fn handle_retry(&mut self) -> Result<ReservationSnapshot, CoordinatorError> {
        if !matches!(
            self.state.phase,
            ReservationPhase::Failed { .. } | ReservationPhase::Expired
        ) {
            return Err(self.invalid_transition("retry"));
        }
        if self.request.is_none() {
            return Err(self.invalid_transition("retry"));
        }

        RESERVATION_RETRIES.inc();
        info!(id = %self.id, "Retrying reservation");

        // Terminal entry already tore these down; make sure anyway before
        // allocating new ones.
        self.timer.cancel();
        self.channel.disconnect();
        self.state.channel_connected = false;
        self.state.remaining_secs = None;
        self.state.last_event_key = None;
        self.state.instructions = None;

        self.do_reserve().await
    }

    /// Shared reserve path for first attempts and retries.
    async fn do_reserve(&mut self) -> Result<ReservationSnapshot, CoordinatorError> {
        let request = self.request.clone().expect("request set before reserve");

        self.state.attempt += 1;
        let attempt = self.state.attempt;
        self.set_phase(ReservationPhase::Reserving);

        let started = tokio::time::Instant::now();
        let result = self.client.reserve(&request).await;
        RESERVE_DURATION.observe(started.elapsed().as_secs_f64());

        match result {
            Ok(instructions) => {
                RESERVE_ATTEMPTS.with_label_values(&["accepted"]).inc();
                info!(
                    id = %self.id,
                    reservation_id = %instructions.reservation_id,
                    attempt,
                    "Reservation accepted, opening payment window"
                );

                let window = Duration::from_secs(self.config.payment_window_secs as u64);
                self.state.instructions = Some(instructions.clone());
                self.state.remaining_secs = Some(self.config.payment_window_secs);

                if let Err(e) = self.timer.start(window, attempt) {
                    // Unreachable from any valid phase; surface loudly
                    // rather than running two countdowns.
                    warn!(id = %self.id, "Deadline timer start rejected: {}", e);
                }

                match self
                    .channel
                    .connect(
                        &instructions.reservation_id,
                        attempt,
                        self.signal_tx.clone(),
                    )
                    .await
                {
                    Ok(()) => self.state.channel_connected = true,
                    Err(e) => {
                        // Non-fatal: the deadline timer is the backstop for a
                        // channel that never comes up.
                        warn!(id = %self.id, "Status channel unavailable: {}", e);
                        self.state.channel_connected = false;
                    }
                }

                self.set_phase(ReservationPhase::AwaitingPayment);
                Ok(self.state.snapshot(&self.id))
            }
            Err(ReserveError::InventoryUnavailable(message)) => {
                RESERVE_ATTEMPTS
                    .with_label_values(&["inventory_unavailable"])
                    .inc();
                info!(id = %self.id, attempt, "Inventory unavailable: {}", message);
                // Straight to Failed; no timer or channel was ever started.
                self.enter_terminal(ReservationPhase::Failed {
                    reason: FailureReason::InventoryUnavailable { message },
                });
                Ok(self.state.snapshot(&self.id))
            }
            Err(e) => {
                let label = match e {
                    ReserveError::Transient(_) => "transient",
                    _ => "protocol",
                };
                RESERVE_ATTEMPTS.with_label_values(&[label]).inc();
                warn!(id = %self.id, attempt, "Reserve call failed: {}", e);
                // No state machine entry; back to Idle so the user action
                // can be retried from scratch.
                self.set_phase(ReservationPhase::Idle);
                Err(CoordinatorError::Reserve(e))
            }
        }
    }

    // ========================================================================
    // Signals
    // ========================================================================

    fn handle_status(&mut self, attempt: u32, event: StatusEvent) {
        if self.is_stale(attempt) {
            return;
        }
        if self.state.phase.is_terminal() {
            // Absorbing: late signals change nothing.
            STALE_SIGNALS_DROPPED.inc();
            debug!(id = %self.id, status = %event.status, "Dropping status event in terminal phase");
            return;
        }

        let phase = self.state.phase.clone();
        let applied = match (&phase, event.status) {
            (ReservationPhase::AwaitingPayment, PaymentStatus::PaymentReceived) => {
                self.set_phase(ReservationPhase::PaymentReceived);
                true
            }
            (ReservationPhase::PaymentReceived, PaymentStatus::Processing) => {
                self.set_phase(ReservationPhase::Processing);
                true
            }
            (ReservationPhase::Processing, PaymentStatus::Completed) => {
                self.enter_terminal(ReservationPhase::Completed);
                true
            }
            (phase, PaymentStatus::Failed) if phase.is_payment_open() => {
                self.enter_terminal(ReservationPhase::Failed {
                    reason: FailureReason::PaymentFailed,
                });
                true
            }
            // The initial status; already reflected by AwaitingPayment.
            (_, PaymentStatus::WaitingPayment) => false,
            // Forward compatibility: unknown statuses never transition.
            (_, PaymentStatus::Unknown) => {
                debug!(id = %self.id, "Ignoring unknown payment status");
                false
            }
            (phase, status) => {
                debug!(
                    id = %self.id,
                    phase = phase.phase_type(),
                    %status,
                    "Ignoring out-of-order status event"
                );
                false
            }
        };

        if applied {
            STATUS_EVENTS_APPLIED
                .with_label_values(&[event.status.as_str()])
                .inc();
            self.state.last_event_key = Some(event.dedup_key());
        }
    }

    fn handle_tick(&mut self, attempt: u32, remaining_secs: u32) {
        if self.is_stale(attempt) {
            return;
        }
        // `remaining` is only defined while awaiting payment; later phases
        // keep the timer purely as an expiry backstop.
        if !matches!(self.state.phase, ReservationPhase::AwaitingPayment) {
            return;
        }

        self.state.remaining_secs = Some(remaining_secs);
        self.state.updated_at = Utc::now();

        if self.config.countdown_updates {
            self.notify(ReservationUpdate::Countdown {
                id: self.id.clone(),
                remaining_secs,
            });
        }
    }

    fn handle_expired(&mut self, attempt: u32) {
        if self.is_stale(attempt) {
            return;
        }
        if !self.state.phase.is_payment_open() {
            // A completed/failed event won the race and already tore the
            // timer down; this firing was already in flight.
            STALE_SIGNALS_DROPPED.inc();
            debug!(id = %self.id, "Dropping deadline expiry outside the payment window");
            return;
        }

        info!(id = %self.id, attempt, "Payment window expired");
        self.enter_terminal(ReservationPhase::Expired);
    }

    fn handle_channel_closed(&mut self, attempt: u32, reason: String) {
        if self.is_stale(attempt) {
            return;
        }
        if !self.state.phase.is_payment_open() {
            return;
        }

        // Not a failure: only an explicit `failed` event or the deadline
        // timer may end the reservation.
        debug!(id = %self.id, "Status channel closed ({}), timer remains the backstop", reason);
        self.channel.disconnect();
        self.state.channel_connected = false;
        self.state.updated_at = Utc::now();
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Discard signals from a previous attempt. Cancellation stops future
    /// signals, but one may already be in flight when it takes effect.
    fn is_stale(&self, attempt: u32) -> bool {
        if attempt != self.state.attempt {
            STALE_SIGNALS_DROPPED.inc();
            debug!(
                id = %self.id,
                signal_attempt = attempt,
                current_attempt = self.state.attempt,
                "Dropping signal from stale attempt"
            );
            return true;
        }
        false
    }

    /// Enter an absorbing phase: tear down the timer and channel together,
    /// then fire the transition edge exactly once.
    fn enter_terminal(&mut self, phase: ReservationPhase) {
        debug_assert!(phase.is_terminal());
        self.teardown();
        RESERVATIONS_TERMINAL
            .with_label_values(&[phase.phase_type()])
            .inc();
        self.set_phase(phase);
    }

    /// Cancel the timer and disconnect the channel. Idempotent.
    fn teardown(&mut self) {
        self.timer.cancel();
        self.channel.disconnect();
        self.state.channel_connected = false;
        self.state.remaining_secs = None;
    }

    fn set_phase(&mut self, phase: ReservationPhase) {
        debug!(
            id = %self.id,
            from = self.state.phase.phase_type(),
            to = phase.phase_type(),
            "Phase transition"
        );
        self.state.phase = phase;
        self.state.updated_at = Utc::now();
        self.notify(ReservationUpdate::PhaseChanged {
            id: self.id.clone(),
            attempt: self.state.attempt,
            phase: self.state.phase.clone(),
        });
    }

    fn notify(&self, update: ReservationUpdate) {
        if let Some(ref callback) = self.update_callback {
            callback(update);
        }
    }

    fn invalid_transition(&self, operation: &'static str) -> CoordinatorError {
        CoordinatorError::InvalidTransition {
            operation,
            phase: self.state.phase.phase_type().to_string(),
        }
    }
}
