use super::{types::ChannelMode, types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Booking base URL looks like an HTTP endpoint
/// - WebSocket channel mode has a URL configured
/// - Payment window and dedup retention are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if !config.booking.base_url.starts_with("http://")
        && !config.booking.base_url.starts_with("https://")
    {
        return Err(ConfigError::ValidationError(
            "booking.base_url must be an http(s) URL".to_string(),
        ));
    }

    if config.channel.mode == ChannelMode::Websocket {
        match &config.channel.websocket {
            Some(ws) if ws.url.starts_with("ws://") || ws.url.starts_with("wss://") => {}
            Some(_) => {
                return Err(ConfigError::ValidationError(
                    "channel.websocket.url must be a ws(s) URL".to_string(),
                ));
            }
            None => {
                return Err(ConfigError::ValidationError(
                    "channel.websocket is required when channel.mode = \"websocket\"".to_string(),
                ));
            }
        }
    }

    if config.coordinator.payment_window_secs == 0 {
        return Err(ConfigError::ValidationError(
            "coordinator.payment_window_secs cannot be 0".to_string(),
        ));
    }

    if config.coordinator.dedup_ttl_secs == 0 {
        return Err(ConfigError::ValidationError(
            "coordinator.dedup_ttl_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
