//! Configuration for an environment session

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Maximum consecutive reconnect attempts before the link goes terminal.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Delay between reconnect attempts.
pub const RECONNECT_INTERVAL: Duration = Duration::from_millis(3000);

/// Debounce before the first connect, to absorb rapid re-entry into the
/// same environment.
pub const CONNECT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Configuration for one collaborative editing session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// WebSocket server URL
    pub server_url: String,

    /// Environment ID (scopes all file/cursor/run messages)
    pub environment_id: String,

    /// File opened when the session starts
    pub initial_file: String,

    /// Maximum consecutive reconnect attempts before giving up
    pub max_reconnect_attempts: u32,

    /// Delay between reconnect attempts
    #[serde(with = "duration_millis")]
    pub reconnect_interval: Duration,

    /// Debounce before the first connect
    #[serde(with = "duration_millis")]
    pub connect_debounce: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:8080".to_string(),
            environment_id: String::new(),
            initial_file: "main.py".to_string(),
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            reconnect_interval: RECONNECT_INTERVAL,
            connect_debounce: CONNECT_DEBOUNCE,
        }
    }
}

impl SessionConfig {
    /// Load config from TOML file
    pub fn from_toml(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.environment_id.is_empty() {
            anyhow::bail!("environment_id cannot be empty");
        }
        if !self.server_url.starts_with("ws://") && !self.server_url.starts_with("wss://") {
            anyhow::bail!("server_url must start with ws:// or wss://");
        }
        if self.max_reconnect_attempts == 0 {
            anyhow::bail!("max_reconnect_attempts must be at least 1");
        }
        Ok(())
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
