//! Application configuration.

use std::path::Path;
use std::time::Duration;

use orderflow_dashboard::DashboardConfig;
use orderflow_engine::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Env var consulted when no `--config` is given.
pub const CONFIG_ENV: &str = "ORDERFLOW_CONFIG";

/// Used when neither the CLI nor the env var names a file.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    /// Buffer counts are logged at this interval.
    #[serde(default = "default_summary_interval_secs")]
    pub summary_interval_secs: u64,
}

fn default_summary_interval_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            dashboard: DashboardConfig::default(),
            summary_interval_secs: default_summary_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, falling back to defaults when the file is missing.
    pub fn load(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.engine.validate()?;
        if self.summary_interval_secs == 0 {
            return Err(AppError::Config(
                "summary_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn summary_interval(&self) -> Duration {
        Duration::from_secs(self.summary_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(!config.engine.auto_demo);
        assert!(config.dashboard.enabled);
        assert_eq!(config.summary_interval(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            summary_interval_secs = 5

            [engine]
            auto_demo = true
            seed = 7

            [dashboard]
            port = 9100
            "#,
        )
        .unwrap();

        assert!(config.engine.auto_demo);
        assert_eq!(config.engine.seed, Some(7));
        assert_eq!(config.dashboard.port, 9100);
        assert_eq!(config.dashboard.host, "127.0.0.1");
        assert_eq!(config.summary_interval_secs, 5);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AppConfig::from_toml("engine = 3").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_zero_summary_interval_rejected() {
        let err = AppConfig::from_toml("summary_interval_secs = 0").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let text = toml::to_string(&AppConfig::default()).unwrap();
        assert!(text.contains("summary_interval_secs"));
        assert_eq!(AppConfig::from_toml(&text).unwrap(), AppConfig::default());
    }
}
