//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Engine(#[from] orderflow_engine::EngineError),

    #[error("Dashboard error: {0}")]
    Dashboard(#[from] orderflow_dashboard::DashboardError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] orderflow_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
