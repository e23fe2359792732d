//! Core domain types for the orderflow simulation engine.
//!
//! This crate provides the leaf types every other crate builds on:
//! - `OpaqueId`: Unique identifier shared by orders and feed events
//! - `Amount`, `Rate`: Precision-safe numeric types
//! - `Order`, `MarketRate`, `LeaderboardEntry` and the event records
//! - `BoundedBuffer`: Fixed-capacity, newest-first collection

pub mod buffer;
pub mod decimal;
pub mod error;
pub mod id;
pub mod types;

pub use buffer::{BoundedBuffer, Keyed};
pub use decimal::{Amount, Rate};
pub use error::{CoreError, Result};
pub use id::{OpaqueId, OrderId};
pub use types::{
    ActivityEvent, ActivityKind, ChatMessage, CurrencyPair, LeaderboardEntry, MarketRate,
    Notification, NotificationKind, Order, OrderOrigin, OrderStatus,
};
