//! Engine error types.
//!
//! Only construction-time faults are errors. Rejected input and stale ids
//! are ordinary outcomes (`None` / `false`) of the lifecycle operations.

use orderflow_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid demo timeline: {0}")]
    InvalidTimeline(String),

    #[error("No tokio runtime available for timers: {0}")]
    NoRuntime(String),

    #[error("Engine has been torn down")]
    TornDown,

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;
