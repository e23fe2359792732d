//! Error types for orderflow-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    #[error("Unknown currency pair: {0}")]
    UnknownPair(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
