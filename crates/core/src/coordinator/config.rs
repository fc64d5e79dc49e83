//! Coordinator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a reservation coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Payment window in seconds. The clock starts when payment
    /// instructions are obtained, not at user-click time.
    #[serde(default = "default_payment_window")]
    pub payment_window_secs: u32,

    /// How long processed status event keys are retained for dedup.
    #[serde(default = "default_dedup_ttl")]
    pub dedup_ttl_secs: u64,

    /// Capacity of the single event queue all signals funnel through.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Emit per-second countdown updates to the UI sink. Headless
    /// deployments can turn this off; expiry does not depend on it.
    #[serde(default = "default_countdown_updates")]
    pub countdown_updates: bool,
}

fn default_payment_window() -> u32 {
    180
}

fn default_dedup_ttl() -> u64 {
    60
}

fn default_queue_capacity() -> usize {
    64
}

fn default_countdown_updates() -> bool {
    true
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            payment_window_secs: default_payment_window(),
            dedup_ttl_secs: default_dedup_ttl(),
            queue_capacity: default_queue_capacity(),
            countdown_updates: default_countdown_updates(),
        }
    }
}
