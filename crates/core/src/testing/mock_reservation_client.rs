//! Mock reservation client for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::reservation::{
    PaymentInstructions, PaymentStatus, ReservationClient, ReservationRequest, ReserveError,
};

/// Mock implementation of the ReservationClient trait.
///
/// Provides controllable behavior for testing:
/// - Track reserve calls for assertions
/// - Queue canned instructions or errors per call
/// - Generate unique instructions by default
///
/// # Example
///
/// ```rust,ignore
/// let client = MockReservationClient::new();
/// client.queue_error(ReserveError::InventoryUnavailable("sold out".into())).await;
///
/// // First reserve fails, subsequent ones succeed with generated
/// // instructions carrying distinct reservation ids.
/// ```
#[derive(Debug, Default)]
pub struct MockReservationClient {
    recorded: Arc<RwLock<Vec<ReservationRequest>>>,
    queued: Arc<RwLock<VecDeque<Result<PaymentInstructions, ReserveError>>>>,
    counter: Arc<RwLock<u32>>,
}

impl MockReservationClient {
    /// Create a new mock client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a canned result for the next reserve call.
    pub async fn queue_instructions(&self, instructions: PaymentInstructions) {
        self.queued.write().await.push_back(Ok(instructions));
    }

    /// Queue an error for the next reserve call.
    pub async fn queue_error(&self, error: ReserveError) {
        self.queued.write().await.push_back(Err(error));
    }

    /// All recorded reserve calls.
    pub async fn recorded_requests(&self) -> Vec<ReservationRequest> {
        self.recorded.read().await.clone()
    }

    /// Number of reserve calls made.
    pub async fn call_count(&self) -> usize {
        self.recorded.read().await.len()
    }

    async fn generate_instructions(&self) -> PaymentInstructions {
        let mut counter = self.counter.write().await;
        *counter += 1;
        PaymentInstructions {
            reservation_id: Uuid::new_v4().to_string(),
            bank_account: "123-456-7890".to_string(),
            bank_name: "Mock Bank".to_string(),
            amount: 1500,
            payment_reference: format!("BOX-{:06}", *counter),
            status: PaymentStatus::WaitingPayment,
        }
    }
}

#[async_trait]
impl ReservationClient for MockReservationClient {
    async fn reserve(
        &self,
        request: &ReservationRequest,
    ) -> Result<PaymentInstructions, ReserveError> {
        self.recorded.write().await.push(request.clone());

        if let Some(result) = self.queued.write().await.pop_front() {
            return result;
        }

        Ok(self.generate_instructions().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservation::LineItem;

    fn request() -> ReservationRequest {
        ReservationRequest::new("show-1", vec![LineItem::new("tt-1", "regular", 2)])
    }

    #[tokio::test]
    async fn test_generates_distinct_reservation_ids() {
        let client = MockReservationClient::new();
        let a = client.reserve(&request()).await.unwrap();
        let b = client.reserve(&request()).await.unwrap();
        assert_ne!(a.reservation_id, b.reservation_id);
        assert_eq!(client.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_queued_error_is_returned_once() {
        let client = MockReservationClient::new();
        client
            .queue_error(ReserveError::InventoryUnavailable("sold out".to_string()))
            .await;

        let err = client.reserve(&request()).await.unwrap_err();
        assert!(matches!(err, ReserveError::InventoryUnavailable(_)));

        // Next call falls back to generated instructions.
        assert!(client.reserve(&request()).await.is_ok());
    }
}
