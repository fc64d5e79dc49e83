//! Reservation API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use boxoffice_core::{
    CoordinatorError, LineItem, PaymentInstructions, Recipient, ReservationPhase,
    ReservationRequest, ReservationSnapshot, ReserveError,
};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a reservation
#[derive(Debug, Deserialize)]
pub struct CreateReservationBody {
    /// Show to reserve tickets for
    pub show_id: String,
    /// Requested line items
    pub tickets: Vec<LineItem>,
    /// Optional recipient
    pub recipient: Option<Recipient>,
}

/// Response for reservation operations
#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    pub id: String,
    pub attempt: u32,
    pub phase: ReservationPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<PaymentInstructions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_secs: Option<u32>,
    pub channel_connected: bool,
    /// Deep link a banking app can open to pre-fill the transfer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_link: Option<String>,
    pub updated_at: String,
}

impl From<ReservationSnapshot> for ReservationResponse {
    fn from(snapshot: ReservationSnapshot) -> Self {
        let payment_link = snapshot.instructions.as_ref().map(payment_link);
        Self {
            id: snapshot.id,
            attempt: snapshot.attempt,
            phase: snapshot.phase,
            instructions: snapshot.instructions,
            remaining_secs: snapshot.remaining_secs,
            channel_connected: snapshot.channel_connected,
            payment_link,
            updated_at: snapshot.updated_at.to_rfc3339(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Build the banking deep link for a set of payment instructions.
///
/// Pure data formatting for the UI sink; the state machine never looks at
/// this.
pub fn payment_link(instructions: &PaymentInstructions) -> String {
    format!(
        "banktransfer://pay?account={}&bank={}&amount={}&reference={}",
        urlencoding::encode(&instructions.bank_account),
        urlencoding::encode(&instructions.bank_name),
        instructions.amount,
        urlencoding::encode(&instructions.payment_reference),
    )
}

fn error_response(error: CoordinatorError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        CoordinatorError::InvalidTransition { .. } => StatusCode::CONFLICT,
        CoordinatorError::Reserve(ReserveError::Transient(_)) => StatusCode::BAD_GATEWAY,
        CoordinatorError::Reserve(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CoordinatorError::Closed => StatusCode::GONE,
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /reservations - start a checkout session and reserve tickets.
pub async fn create_reservation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateReservationBody>,
) -> impl IntoResponse {
    if body.tickets.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "tickets cannot be empty".to_string(),
            }),
        )
            .into_response();
    }

    let mut request = ReservationRequest::new(body.show_id, body.tickets);
    if let Some(recipient) = body.recipient {
        request = request.with_recipient(recipient);
    }

    let handle = state.create_session().await;
    match handle.reserve(request).await {
        Ok(snapshot) => {
            (StatusCode::CREATED, Json(ReservationResponse::from(snapshot))).into_response()
        }
        Err(error) => {
            // Reserve made no state machine entry; drop the fresh session.
            if let Some(handle) = state.remove_session(handle.id()).await {
                handle.cancel().await;
            }
            error_response(error).into_response()
        }
    }
}

/// GET /reservations/{id} - current snapshot.
pub async fn get_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Some(handle) = state.session(&id).await else {
        return not_found(&id).into_response();
    };

    match handle.snapshot().await {
        Ok(snapshot) => Json(ReservationResponse::from(snapshot)).into_response(),
        Err(error) => error_response(error).into_response(),
    }
}

/// POST /reservations/{id}/retry - fresh attempt from Failed or Expired.
pub async fn retry_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Some(handle) = state.session(&id).await else {
        return not_found(&id).into_response();
    };

    match handle.retry().await {
        Ok(snapshot) => Json(ReservationResponse::from(snapshot)).into_response(),
        Err(error) => error_response(error).into_response(),
    }
}

/// DELETE /reservations/{id} - tear the session down.
pub async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Some(handle) = state.remove_session(&id).await else {
        return not_found(&id).into_response();
    };

    handle.cancel().await;
    StatusCode::NO_CONTENT.into_response()
}

fn not_found(id: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("reservation not found: {}", id),
        }),
    )
}
