use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::path::Path;

use dstore_callback::CallbackConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener for node requests.
    pub bind_addr: SocketAddr,
    /// Listener for the admin HTTP API.
    pub admin_addr: SocketAddr,
    /// Concurrent node connections served by the request listener.
    pub max_connections: usize,
    pub update_queue_ports: PortRange,
    pub callbacks: CallbackConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 44530)),
            admin_addr: SocketAddr::from(([127, 0, 0, 1], 44531)),
            max_connections: 256,
            update_queue_ports: PortRange::default(),
            callbacks: CallbackConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read a TOML config file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    fn validate(&self) -> ServerResult<()> {
        if self.update_queue_ports.first > self.update_queue_ports.last {
            return Err(ServerError::Config(format!(
                "update_queue_ports: first {} is after last {}",
                self.update_queue_ports.first, self.update_queue_ports.last
            )));
        }
        if self.max_connections == 0 {
            return Err(ServerError::Config("max_connections must be positive".into()));
        }
        Ok(())
    }
}

/// Inclusive range of update-queue ports handed out to registering nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub first: u16,
    pub last: u16,
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            first: 44540,
            last: 44739,
        }
    }
}

impl PortRange {
    pub fn range(&self) -> RangeInclusive<u16> {
        self.first..=self.last
    }
}
