//! Synthetic market feed for the orderflow simulation.
//!
//! Produces randomized but plausible records so a dashboard looks live
//! without a backend:
//! - `generate_id`: Opaque ids, unique for the life of the process
//! - `generator`: Rates, orders, leaderboard rows, notifications,
//!   messages and activity events
//! - `format`: Display helpers for decimal values
//!
//! Generators hold no state. Each takes the caller's `Rng`, so a seeded
//! `StdRng` reproduces the same feed.

pub mod format;
pub mod generator;
pub mod ids;

pub use format::{format_compact, format_number};
pub use generator::{
    generate_activities, generate_activity, generate_amount, generate_leaderboard,
    generate_market_rate, generate_message, generate_messages, generate_notification,
    generate_notifications, generate_order, generate_order_for_pair, generate_orders,
    generate_rate, get_currency_pairs, rank_entries, MAX_AMOUNT, MAX_RATE_DEVIATION_BPS,
    MIN_AMOUNT,
};
pub use ids::generate_id;
