//! Reservation client trait and error types.

use async_trait::async_trait;
use thiserror::Error;

use super::{PaymentInstructions, ReservationRequest};

/// Errors from the reserve call against the booking service.
#[derive(Debug, Clone, Error)]
pub enum ReserveError {
    /// Tickets are sold or held by another party. Terminal for this attempt;
    /// the caller must not start a timer or status channel.
    #[error("inventory unavailable: {0}")]
    InventoryUnavailable(String),

    /// Network or server fault. No state machine entry is made; the user
    /// action can be retried from scratch.
    #[error("transient reservation failure: {0}")]
    Transient(String),

    /// The booking service answered with something we cannot interpret.
    #[error("booking service protocol error: {0}")]
    Protocol(String),
}

/// Trait for reservation backends.
///
/// `reserve` performs the network call and nothing else; it is idempotent
/// only if the caller guarantees a single invocation per user action. The
/// coordinator enforces that by rejecting a reserve while one is in flight.
#[async_trait]
pub trait ReservationClient: Send + Sync {
    /// Reserve tickets and return payment instructions.
    async fn reserve(
        &self,
        request: &ReservationRequest,
    ) -> Result<PaymentInstructions, ReserveError>;
}
