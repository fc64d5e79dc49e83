//! Testing utilities and mock implementations for lifecycle tests.
//!
//! This module provides mock implementations of the external service traits,
//! allowing comprehensive coordinator testing without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use boxoffice_core::testing::{MockReservationClient, ScriptedStatusTransport, ScriptStep};
//!
//! let client = MockReservationClient::new();
//! let transport = ScriptedStatusTransport::new();
//!
//! // Configure the scripted payment progression
//! transport.push_script(vec![
//!     ScriptStep::status(Duration::from_secs(5), PaymentStatus::PaymentReceived, ts),
//! ]).await;
//!
//! // Use in a Coordinator...
//! ```

mod mock_reservation_client;
mod scripted_transport;

pub use mock_reservation_client::MockReservationClient;
pub use scripted_transport::{ScriptStep, ScriptedStatusTransport};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::reservation::{LineItem, PaymentInstructions, PaymentStatus, ReservationRequest};

    /// Create a test reservation request with reasonable defaults.
    pub fn reservation_request(show_id: &str) -> ReservationRequest {
        ReservationRequest::new(
            show_id,
            vec![
                LineItem::new("tt-regular", "regular", 2),
                LineItem::new("tt-vip", "vip", 1),
            ],
        )
    }

    /// Create test payment instructions with a fixed reservation id.
    pub fn payment_instructions(reservation_id: &str) -> PaymentInstructions {
        PaymentInstructions {
            reservation_id: reservation_id.to_string(),
            bank_account: "987-654-3210".to_string(),
            bank_name: "Fixture Bank".to_string(),
            amount: 4200,
            payment_reference: "BOX-FIXTURE".to_string(),
            status: PaymentStatus::WaitingPayment,
        }
    }
}
