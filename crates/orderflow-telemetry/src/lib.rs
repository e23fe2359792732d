//! Prometheus metrics and structured logging for the orderflow simulation.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Prometheus counters for lifecycle transitions, feed ticks and timers

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
