//! HTTP reservation client against the inventory/booking service.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::BookingConfig;

use super::{PaymentInstructions, ReservationClient, ReservationRequest, ReserveError};

/// Error codes the booking service uses for exhausted inventory.
const INVENTORY_ERROR_CODES: &[&str] = &["sold_out", "already_taken", "inventory_unavailable"];

/// Error body shape returned by the booking service.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: String,
    #[serde(default)]
    message: Option<String>,
}

/// Reservation client backed by the booking service's HTTP API.
pub struct HttpReservationClient {
    client: Client,
    config: BookingConfig,
}

impl HttpReservationClient {
    /// Create a new client with the given configuration.
    pub fn new(config: BookingConfig) -> Result<Self, ReserveError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| ReserveError::Protocol(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn reserve_url(&self) -> String {
        format!(
            "{}/reservations",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Map a non-success response to a typed error.
    ///
    /// The service reports exhausted inventory with a typed error code, not
    /// free-form message text.
    fn map_error(status: StatusCode, body: &str) -> ReserveError {
        if status.is_server_error() {
            return ReserveError::Transient(format!("booking service returned {}", status));
        }

        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => {
                let code = parsed.error.code.as_str();
                let message = parsed
                    .error
                    .message
                    .unwrap_or_else(|| code.to_string());
                if INVENTORY_ERROR_CODES.contains(&code) {
                    ReserveError::InventoryUnavailable(message)
                } else {
                    ReserveError::Protocol(format!("{} ({})", message, code))
                }
            }
            Err(_) => ReserveError::Protocol(format!(
                "booking service returned {} with unparseable body",
                status
            )),
        }
    }
}

#[async_trait]
impl ReservationClient for HttpReservationClient {
    async fn reserve(
        &self,
        request: &ReservationRequest,
    ) -> Result<PaymentInstructions, ReserveError> {
        let url = self.reserve_url();
        debug!(show_id = %request.show_id, "Reserving tickets");

        let mut req = self.client.post(&url).json(request);
        if let Some(ref api_key) = self.config.api_key {
            req = req.bearer_auth(api_key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ReserveError::Transient("booking service timed out".to_string())
            } else {
                ReserveError::Transient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = Self::map_error(status, &body);
            warn!(%status, "Reserve call failed: {}", err);
            return Err(err);
        }

        let instructions: PaymentInstructions = response
            .json()
            .await
            .map_err(|e| ReserveError::Protocol(format!("invalid reserve response: {}", e)))?;

        debug!(
            reservation_id = %instructions.reservation_id,
            amount = instructions.amount,
            "Tickets reserved"
        );

        Ok(instructions)
    }
}
