//! Reservation domain types and the booking service client.

mod client;
mod http;
mod types;

pub use client::{ReservationClient, ReserveError};
pub use http::HttpReservationClient;
pub use types::{
    FailureReason, LineItem, PaymentInstructions, PaymentStatus, Recipient, ReservationPhase,
    ReservationRequest, ReservationSnapshot, ReservationState, StatusEvent,
};
