//! Types for the reservation coordinator.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::reservation::{
    ReservationPhase, ReservationRequest, ReservationSnapshot, ReserveError, StatusEvent,
};

/// Errors surfaced by coordinator operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The requested operation is not allowed in the current phase.
    #[error("invalid transition: cannot {operation} while {phase}")]
    InvalidTransition {
        operation: &'static str,
        phase: String,
    },

    /// The reserve call failed without entering the state machine.
    #[error(transparent)]
    Reserve(#[from] ReserveError),

    /// The coordinator task is gone (canceled or torn down).
    #[error("coordinator is closed")]
    Closed,
}

/// Everything that can reach the coordinator's single event queue: user
/// commands, timer signals and status channel events. Serializing them
/// through one queue is what makes the expired-vs-completed race
/// deterministic.
pub(crate) enum CoordinatorMessage {
    Reserve {
        request: ReservationRequest,
        reply: oneshot::Sender<Result<ReservationSnapshot, CoordinatorError>>,
    },
    Retry {
        reply: oneshot::Sender<Result<ReservationSnapshot, CoordinatorError>>,
    },
    Snapshot {
        reply: oneshot::Sender<ReservationSnapshot>,
    },
    Cancel {
        reply: oneshot::Sender<()>,
    },
    /// Deduplicated status event from the channel adapter.
    Status { attempt: u32, event: StatusEvent },
    /// One-second countdown tick from the deadline timer.
    CountdownTick { attempt: u32, remaining_secs: u32 },
    /// The payment window elapsed. Fires at most once per timer.
    DeadlineExpired { attempt: u32 },
    /// The status channel reader ended without a terminal event. Not a
    /// failure; the deadline timer remains the backstop.
    ChannelClosed { attempt: u32, reason: String },
}

/// Sender half of the coordinator queue, handed to the timer and the channel
/// adapter.
pub(crate) type SignalTx = mpsc::Sender<CoordinatorMessage>;

/// Notification pushed to the UI sink on state changes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReservationUpdate {
    /// The reservation moved to a new phase.
    PhaseChanged {
        id: String,
        attempt: u32,
        phase: ReservationPhase,
    },
    /// Countdown tick while awaiting payment.
    Countdown { id: String, remaining_secs: u32 },
}

/// Callback invoked by the coordinator on every update, on the transition
/// edge only.
pub type ReservationUpdateCallback = Arc<dyn Fn(ReservationUpdate) + Send + Sync>;
