use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, middleware::metrics_middleware, reservations, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health, config, metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        // Reservations
        .route("/reservations", post(reservations::create_reservation))
        .route("/reservations/{id}", get(reservations::get_reservation))
        .route(
            "/reservations/{id}",
            delete(reservations::cancel_reservation),
        )
        .route(
            "/reservations/{id}/retry",
            post(reservations::retry_reservation),
        )
        // Real-time updates for the UI sink
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
