//! Order lifecycle simulation engine.
//!
//! Main application that wires the pieces together:
//! - TOML configuration and CLI overrides
//! - Simulation engine (lifecycle, synthetic market, auto-demo)
//! - Browser dashboard over REST and WebSocket
//! - Periodic summary logging and ctrl-c teardown

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
