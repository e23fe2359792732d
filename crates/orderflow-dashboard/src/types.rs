//! Dashboard API types.
//!
//! These types are used for JSON serialization in REST and WebSocket APIs.
//! Display strings are rendered here so the browser never formats money.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orderflow_core::{
    ActivityEvent, ActivityKind, ChatMessage, CurrencyPair, LeaderboardEntry, MarketRate,
    Notification, Order, OrderOrigin, OrderStatus,
};
use orderflow_engine::DemoUiState;
use orderflow_feed::{format_compact, format_number};

/// Full dashboard state (sent on connect, after every engine change, and via REST).
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    /// Timestamp when snapshot was taken (Unix milliseconds).
    pub timestamp_ms: i64,
    /// Engine snapshot version.
    pub version: u64,
    pub rate: RateView,
    pub pending: Vec<OrderView>,
    pub escrowed: Vec<OrderView>,
    pub completed: Vec<OrderView>,
    /// Synthetic order book.
    pub demo_orders: Vec<OrderView>,
    pub leaderboard: Vec<LeaderboardView>,
    pub notifications: Vec<Notification>,
    pub unread_notifications: usize,
    pub messages: Vec<ChatMessage>,
    pub unread_messages: usize,
    pub activity: Vec<ActivityView>,
    pub demo: DemoUiState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateView {
    pub pair: CurrencyPair,
    pub rate: Decimal,
    /// e.g. "3.6725 AED"
    pub display: String,
    pub as_of_ms: i64,
}

impl From<&MarketRate> for RateView {
    fn from(rate: &MarketRate) -> Self {
        Self {
            pair: rate.pair,
            rate: rate.rate.inner(),
            display: format!("{} {}", rate.rate.inner().round_dp(4), rate.pair.fiat()),
            as_of_ms: rate.as_of.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView {
    pub id: String,
    /// `None` for synthetic orders, which have no lifecycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    pub origin: OrderOrigin,
    pub amount: Decimal,
    pub amount_display: String,
    pub rate: Decimal,
    pub fiat_display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trader: Option<String>,
    pub timestamp_ms: i64,
}

impl OrderView {
    pub fn new(order: &Order, status: Option<OrderStatus>) -> Self {
        Self {
            id: order.id.to_string(),
            status,
            origin: order.origin,
            amount: order.amount.inner(),
            amount_display: format_number(order.amount.inner()),
            rate: order.rate.inner(),
            fiat_display: format_number(order.fiat_value()),
            trader: order.trader.clone(),
            timestamp_ms: order.timestamp.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardView {
    pub rank: u32,
    pub name: String,
    pub volume: Decimal,
    /// e.g. "1.2M"
    pub volume_display: String,
    pub trades: u32,
    pub rating: Decimal,
    pub online: bool,
}

impl From<&LeaderboardEntry> for LeaderboardView {
    fn from(entry: &LeaderboardEntry) -> Self {
        Self {
            rank: entry.rank,
            name: entry.name.clone(),
            volume: entry.volume,
            volume_display: format_compact(entry.volume),
            trades: entry.trades,
            rating: entry.rating,
            online: entry.online,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityView {
    pub id: String,
    pub kind: ActivityKind,
    pub actor: String,
    pub amount_display: String,
    pub pair: CurrencyPair,
    pub time_ms: i64,
}

impl From<&ActivityEvent> for ActivityView {
    fn from(event: &ActivityEvent) -> Self {
        Self {
            id: event.id.to_string(),
            kind: event.kind,
            actor: event.actor.clone(),
            amount_display: format_number(event.amount.inner()),
            pair: event.pair,
            time_ms: event.time.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PairView {
    pub code: &'static str,
    pub fiat: &'static str,
    pub baseline: Decimal,
}

impl From<CurrencyPair> for PairView {
    fn from(pair: CurrencyPair) -> Self {
        Self {
            code: pair.code(),
            fiat: pair.fiat(),
            baseline: pair.baseline_rate().inner(),
        }
    }
}

// ============================================================================
// Requests and responses
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub amount: Decimal,
    pub rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderResponse {
    pub order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetPairRequest {
    pub pair: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatedResponse {
    pub updated: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// WebSocket
// ============================================================================

/// WebSocket message types (tagged enum for type safety).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardMessage {
    /// Full snapshot (sent on connect).
    Snapshot(Box<DashboardSnapshot>),
    /// Engine state changed.
    Update(Box<DashboardSnapshot>),
    /// Demo overlay changed.
    Demo(DemoUiState),
    /// One frame of the eased rate animation.
    RateFrame {
        timestamp_ms: i64,
        pair: CurrencyPair,
        /// Value to display now.
        rate: Decimal,
        /// Value the animation ends at.
        target: Decimal,
    },
}
