use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::coordinator::CoordinatorConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub booking: BookingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Inventory/booking service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BookingConfig {
    /// Booking service base URL (e.g. "http://localhost:9200/api")
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Bearer token for the booking service, if required
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_timeout() -> u32 {
    30
}

/// Payment status channel configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ChannelConfig {
    /// Channel backend
    #[serde(default)]
    pub mode: ChannelMode,
    /// WebSocket configuration (required when mode = "websocket")
    #[serde(default)]
    pub websocket: Option<WsChannelConfig>,
    /// Simulated progression configuration
    #[serde(default)]
    pub simulated: SimulatedChannelConfig,
}

/// Available status channel backends
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// Live WebSocket against the payment gateway.
    Websocket,
    /// Synthesized status progression for environments without a gateway.
    #[default]
    Simulated,
}

/// WebSocket status channel configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WsChannelConfig {
    /// Gateway status endpoint base URL; the reservation id is appended
    /// (e.g. "wss://gateway.example/status")
    pub url: String,
}

/// Simulated status channel configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatedChannelConfig {
    /// Delay between synthesized status steps in milliseconds
    #[serde(default = "default_step_delay")]
    pub step_delay_ms: u64,
    /// Extra random delay added to each step (0 = fixed delays)
    #[serde(default)]
    pub jitter_ms: u64,
    /// Terminal status of the synthesized progression
    #[serde(default)]
    pub outcome: SimulatedOutcome,
}

impl Default for SimulatedChannelConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: default_step_delay(),
            jitter_ms: 0,
            outcome: SimulatedOutcome::default(),
        }
    }
}

fn default_step_delay() -> u64 {
    2000
}

/// Terminal status for the simulated channel
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimulatedOutcome {
    #[default]
    Completed,
    Failed,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub booking: SanitizedBookingConfig,
    pub channel: ChannelConfig,
    pub coordinator: CoordinatorConfig,
}

/// Sanitized booking config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedBookingConfig {
    pub base_url: String,
    pub timeout_secs: u32,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            booking: SanitizedBookingConfig {
                base_url: config.booking.base_url.clone(),
                timeout_secs: config.booking.timeout_secs,
                api_key_configured: config.booking.api_key.is_some(),
            },
            channel: config.channel.clone(),
            coordinator: config.coordinator.clone(),
        }
    }
}
