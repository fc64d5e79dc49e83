//! Core reservation data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request Types
// ============================================================================

/// A single line item in a reservation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    /// Ticket type identifier.
    pub id: String,
    /// Ticket type label (e.g. "early_bird", "vip").
    #[serde(rename = "type")]
    pub ticket_type: String,
    /// Number of tickets requested.
    pub quantity: u32,
}

impl LineItem {
    /// Create a new line item.
    pub fn new(id: impl Into<String>, ticket_type: impl Into<String>, quantity: u32) -> Self {
        Self {
            id: id.into(),
            ticket_type: ticket_type.into(),
            quantity,
        }
    }
}

/// Optional recipient of the tickets (carried opaque, not validated here).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipient {
    /// Recipient name.
    pub name: String,
    /// Contact phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A request to reserve tickets for a show.
///
/// Immutable once submitted; a retry re-submits the same line items and
/// obtains a fresh reservation identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservationRequest {
    /// Show identifier.
    pub show_id: String,
    /// Requested line items.
    pub tickets: Vec<LineItem>,
    /// Optional recipient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Recipient>,
}

impl ReservationRequest {
    /// Create a new reservation request.
    pub fn new(show_id: impl Into<String>, tickets: Vec<LineItem>) -> Self {
        Self {
            show_id: show_id.into(),
            tickets,
            recipient: None,
        }
    }

    /// Attach a recipient.
    pub fn with_recipient(mut self, recipient: Recipient) -> Self {
        self.recipient = Some(recipient);
        self
    }
}

// ============================================================================
// Payment Types
// ============================================================================

/// Payment lifecycle status reported by the gateway.
///
/// Unrecognized values deserialize to `Unknown` and never cause a phase
/// transition, so new gateway statuses cannot break the coordinator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    WaitingPayment,
    PaymentReceived,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// Stable string form used in dedup keys, logs and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::WaitingPayment => "waiting_payment",
            PaymentStatus::PaymentReceived => "payment_received",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment instructions returned by the booking service on a successful
/// reservation.
///
/// Created once per reservation, never mutated. The `reservation_id` is the
/// opaque token used to address the payment status channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentInstructions {
    /// Opaque reservation token, also the status channel address.
    pub reservation_id: String,
    /// Bank account number to transfer to.
    pub bank_account: String,
    /// Bank name.
    pub bank_name: String,
    /// Amount due, in whole currency units.
    pub amount: i64,
    /// Payment reference the payer must include.
    pub payment_reference: String,
    /// Initial payment status (always `waiting_payment` from the backend).
    pub status: PaymentStatus,
}

// ============================================================================
// Status Channel Events
// ============================================================================

/// A payment status event delivered over the status channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusEvent {
    /// Event kind; the channel only forwards `payment_status` frames.
    #[serde(rename = "type")]
    pub kind: String,
    /// Reported payment status.
    pub status: PaymentStatus,
    /// Gateway-side timestamp of the event.
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    /// Create a payment status event.
    pub fn payment_status(status: PaymentStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: "payment_status".to_string(),
            status,
            timestamp,
        }
    }

    /// Derived identity used to drop repeated deliveries of the same event.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.kind,
            self.status.as_str(),
            self.timestamp.to_rfc3339()
        )
    }
}

// ============================================================================
// Reservation State
// ============================================================================

/// Why a reservation ended up in the `Failed` phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Tickets were sold or held by another party at reserve time.
    InventoryUnavailable { message: String },
    /// The payment gateway reported the payment as failed.
    PaymentFailed,
}

/// Current phase of a reservation.
///
/// State machine flow:
/// ```text
/// Idle -> Reserving -> AwaitingPayment -> PaymentReceived -> Processing -> Completed
///             |              |
///             v              v
///          Failed         Expired (payment window elapsed)
///
/// AwaitingPayment/PaymentReceived/Processing can transition to Failed on a
/// `failed` status event. Completed, Failed and Expired are absorbing; only
/// an explicit retry leaves Failed or Expired.
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReservationPhase {
    /// Nothing in flight.
    Idle,
    /// Reserve call against the booking service is in flight.
    Reserving,
    /// Payment instructions issued, waiting for the payer to act.
    AwaitingPayment,
    /// Gateway saw the incoming payment.
    PaymentReceived,
    /// Gateway is processing the payment.
    Processing,
    /// Payment confirmed (terminal).
    Completed,
    /// Reservation failed (terminal).
    Failed { reason: FailureReason },
    /// Payment window elapsed without confirmation (terminal).
    Expired,
}

impl ReservationPhase {
    /// Stable string form of the phase (for logs, metrics, API filters).
    pub fn phase_type(&self) -> &'static str {
        match self {
            ReservationPhase::Idle => "idle",
            ReservationPhase::Reserving => "reserving",
            ReservationPhase::AwaitingPayment => "awaiting_payment",
            ReservationPhase::PaymentReceived => "payment_received",
            ReservationPhase::Processing => "processing",
            ReservationPhase::Completed => "completed",
            ReservationPhase::Failed { .. } => "failed",
            ReservationPhase::Expired => "expired",
        }
    }

    /// True for absorbing phases.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationPhase::Completed
                | ReservationPhase::Failed { .. }
                | ReservationPhase::Expired
        )
    }

    /// True while the payment window is open: the deadline timer is running
    /// and the status channel is (or should be) connected.
    pub fn is_payment_open(&self) -> bool {
        matches!(
            self,
            ReservationPhase::AwaitingPayment
                | ReservationPhase::PaymentReceived
                | ReservationPhase::Processing
        )
    }
}

/// The mutable state owned by a reservation coordinator.
///
/// Only the coordinator task mutates this; the timer and channel adapter just
/// emit signals into its queue.
#[derive(Debug, Clone)]
pub struct ReservationState {
    /// Current phase.
    pub phase: ReservationPhase,
    /// Payment instructions, present from `AwaitingPayment` onward.
    pub instructions: Option<PaymentInstructions>,
    /// Seconds left in the payment window; defined only in `AwaitingPayment`.
    pub remaining_secs: Option<u32>,
    /// Dedup key of the most recently applied status event.
    pub last_event_key: Option<String>,
    /// Whether the status channel is currently connected.
    pub channel_connected: bool,
    /// Reservation attempt number; bumped by every reserve/retry.
    pub attempt: u32,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl ReservationState {
    /// Fresh state in the `Idle` phase.
    pub fn new() -> Self {
        Self {
            phase: ReservationPhase::Idle,
            instructions: None,
            remaining_secs: None,
            last_event_key: None,
            channel_connected: false,
            attempt: 0,
            updated_at: Utc::now(),
        }
    }

    /// Build a snapshot for API/WS consumers.
    pub fn snapshot(&self, id: &str) -> ReservationSnapshot {
        ReservationSnapshot {
            id: id.to_string(),
            attempt: self.attempt,
            phase: self.phase.clone(),
            instructions: self.instructions.clone(),
            remaining_secs: self.remaining_secs,
            channel_connected: self.channel_connected,
            last_event_key: self.last_event_key.clone(),
            updated_at: self.updated_at,
        }
    }
}

impl Default for ReservationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a reservation, serialized for API responses and
/// WebSocket pushes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservationSnapshot {
    /// Coordinator/session identifier.
    pub id: String,
    /// Reservation attempt number.
    pub attempt: u32,
    /// Current phase.
    pub phase: ReservationPhase,
    /// Payment instructions, if issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<PaymentInstructions>,
    /// Seconds left in the payment window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_secs: Option<u32>,
    /// Whether the status channel is connected.
    pub channel_connected: bool,
    /// Dedup key of the most recently applied status event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_key: Option<String>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_payment_status_unknown_from_wire() {
        let status: PaymentStatus = serde_json::from_str("\"refund_pending\"").unwrap();
        assert_eq!(status, PaymentStatus::Unknown);
    }

    #[test]
    fn test_payment_status_known_from_wire() {
        let status: PaymentStatus = serde_json::from_str("\"payment_received\"").unwrap();
        assert_eq!(status, PaymentStatus::PaymentReceived);
    }

    #[test]
    fn test_status_event_dedup_key() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let event = StatusEvent::payment_status(PaymentStatus::Completed, ts);
        assert_eq!(
            event.dedup_key(),
            "payment_status:completed:2024-03-01T12:00:00+00:00"
        );
    }

    #[test]
    fn test_status_event_wire_format() {
        let json = r#"{"type":"payment_status","status":"processing","timestamp":"2024-03-01T12:00:00Z"}"#;
        let event: StatusEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, "payment_status");
        assert_eq!(event.status, PaymentStatus::Processing);
    }

    #[test]
    fn test_phase_terminal_classification() {
        assert!(ReservationPhase::Completed.is_terminal());
        assert!(ReservationPhase::Expired.is_terminal());
        assert!(ReservationPhase::Failed {
            reason: FailureReason::PaymentFailed
        }
        .is_terminal());
        assert!(!ReservationPhase::Idle.is_terminal());
        assert!(!ReservationPhase::AwaitingPayment.is_terminal());
    }

    #[test]
    fn test_phase_payment_open_classification() {
        assert!(ReservationPhase::AwaitingPayment.is_payment_open());
        assert!(ReservationPhase::PaymentReceived.is_payment_open());
        assert!(ReservationPhase::Processing.is_payment_open());
        assert!(!ReservationPhase::Reserving.is_payment_open());
        assert!(!ReservationPhase::Completed.is_payment_open());
    }

    #[test]
    fn test_phase_serializes_tagged() {
        let phase = ReservationPhase::Failed {
            reason: FailureReason::PaymentFailed,
        };
        let json = serde_json::to_string(&phase).unwrap();
        assert!(json.contains("\"type\":\"failed\""));
        assert!(json.contains("\"kind\":\"payment_failed\""));
    }

    #[test]
    fn test_new_state_is_idle() {
        let state = ReservationState::new();
        assert_eq!(state.phase, ReservationPhase::Idle);
        assert!(state.instructions.is_none());
        assert!(state.remaining_secs.is_none());
        assert!(!state.channel_connected);
        assert_eq!(state.attempt, 0);
    }

    #[test]
    fn test_line_item_wire_uses_type_key() {
        let item = LineItem::new("tt-1", "early_bird", 2);
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"type\":\"early_bird\""));
    }
}
