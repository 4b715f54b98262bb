use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for callback delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Delivery attempts before the target node is declared dead.
    pub max_attempts: u32,
    /// Base delay between attempts; grows linearly with the attempt number.
    pub retry_backoff_ms: u64,
    /// How long one attempt may wait for the node's acknowledgement.
    pub request_timeout_ms: u64,
    /// Maximum number of deliveries in progress at once.
    pub max_in_flight: usize,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_backoff_ms: 200,
            request_timeout_ms: 10_000,
            max_in_flight: 256,
        }
    }
}

impl CallbackConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
