//! Dashboard configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Dashboard server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Enable dashboard server.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Tick of the rate animation frames sent over WebSocket.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Length of one eased rate transition.
    #[serde(default = "default_rate_animation_ms")]
    pub rate_animation_ms: u64,
    /// Maximum concurrent WebSocket connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_frame_interval_ms() -> u64 {
    50
}

fn default_rate_animation_ms() -> u64 {
    600
}

fn default_max_connections() -> usize {
    10
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            host: default_host(),
            port: default_port(),
            frame_interval_ms: default_frame_interval_ms(),
            rate_animation_ms: default_rate_animation_ms(),
            max_connections: default_max_connections(),
        }
    }
}

impl DashboardConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn rate_animation(&self) -> Duration {
        Duration::from_millis(self.rate_animation_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: DashboardConfig = serde_json::from_str(r#"{ "port": 9000 }"#).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert_eq!(config.frame_interval(), Duration::from_millis(50));
        assert_eq!(config.max_connections, 10);
    }

    #[test]
    fn test_frame_interval_never_zero() {
        let config = DashboardConfig {
            frame_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.frame_interval(), Duration::from_millis(1));
    }
}
