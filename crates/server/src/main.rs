use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use boxoffice_core::{
    load_config, validate_config, ChannelMode, HttpReservationClient, ReservationClient,
    SimulatedStatusTransport, StatusTransport, WsStatusTransport,
};

use boxoffice_server::api::create_router;
use boxoffice_server::state::AppState;

/// Interval between WebSocket heartbeats
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("BOXOFFICE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Booking service: {}", config.booking.base_url);
    info!(
        "Payment window: {}s",
        config.coordinator.payment_window_secs
    );

    // Create the reservation client
    let client: Arc<dyn ReservationClient> = Arc::new(
        HttpReservationClient::new(config.booking.clone())
            .context("Failed to create reservation client")?,
    );

    // Create the status channel transport
    let transport: Arc<dyn StatusTransport> = match config.channel.mode {
        ChannelMode::Websocket => {
            let ws_config = config
                .channel
                .websocket
                .clone()
                .context("channel.websocket config missing")?;
            info!("Using WebSocket status channel at {}", ws_config.url);
            Arc::new(WsStatusTransport::new(ws_config))
        }
        ChannelMode::Simulated => {
            info!("Using simulated status channel (no live gateway)");
            Arc::new(SimulatedStatusTransport::new(config.channel.simulated.clone()))
        }
    };

    let state = Arc::new(AppState::new(config.clone(), client, transport));

    // Periodic WebSocket heartbeat
    let heartbeat_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            interval.tick().await;
            heartbeat_state
                .ws_broadcaster()
                .heartbeat(chrono::Utc::now().timestamp());
        }
    });

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
