//! Domain records produced by the synthetic feed and the order lifecycle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::buffer::Keyed;
use crate::decimal::{Amount, Rate};
use crate::error::CoreError;
use crate::id::{OpaqueId, OrderId};

// ============================================================================
// CurrencyPair
// ============================================================================

/// Supported crypto/fiat pairs. The set is fixed so that rate generation is
/// total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CurrencyPair {
    #[default]
    #[serde(rename = "USDT/AED")]
    UsdtAed,
    #[serde(rename = "USDT/INR")]
    UsdtInr,
    #[serde(rename = "USDT/NGN")]
    UsdtNgn,
    #[serde(rename = "USDT/EUR")]
    UsdtEur,
    #[serde(rename = "USDT/BRL")]
    UsdtBrl,
    #[serde(rename = "USDT/KES")]
    UsdtKes,
}

impl CurrencyPair {
    pub const ALL: [CurrencyPair; 6] = [
        Self::UsdtAed,
        Self::UsdtInr,
        Self::UsdtNgn,
        Self::UsdtEur,
        Self::UsdtBrl,
        Self::UsdtKes,
    ];

    /// Display code, e.g. `USDT/AED`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UsdtAed => "USDT/AED",
            Self::UsdtInr => "USDT/INR",
            Self::UsdtNgn => "USDT/NGN",
            Self::UsdtEur => "USDT/EUR",
            Self::UsdtBrl => "USDT/BRL",
            Self::UsdtKes => "USDT/KES",
        }
    }

    /// Fiat currency code.
    pub fn fiat(&self) -> &'static str {
        &self.code()[5..]
    }

    /// Reference rate synthetic quotes oscillate around.
    pub fn baseline_rate(&self) -> Rate {
        let d = match self {
            Self::UsdtAed => Decimal::new(36725, 4),
            Self::UsdtInr => Decimal::new(8325, 2),
            Self::UsdtNgn => Decimal::new(155_000, 2),
            Self::UsdtEur => Decimal::new(9210, 4),
            Self::UsdtBrl => Decimal::new(49800, 4),
            Self::UsdtKes => Decimal::new(12950, 2),
        };
        Rate::new(d)
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyPair {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', '_'], "/");
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.code() == normalized)
            .ok_or_else(|| CoreError::UnknownPair(s.to_string()))
    }
}

// ============================================================================
// Orders
// ============================================================================

/// Lifecycle stage of an order.
///
/// Never stored on the order itself: it is derived from the buffer that
/// currently holds the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Escrowed,
    Completed,
}

impl OrderStatus {
    /// The only stage this one may advance to, `None` for terminal.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Escrowed),
            Self::Escrowed => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Escrowed => write!(f, "escrowed"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Where an order came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderOrigin {
    /// Placed through `place` (by a user or the demo script).
    User,
    /// Produced by the synthetic market feed.
    Synthetic,
}

/// A simulated order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub amount: Amount,
    pub rate: Rate,
    pub timestamp: DateTime<Utc>,
    pub origin: OrderOrigin,
    /// Counterparty display name (synthetic orders only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trader: Option<String>,
}

impl Order {
    /// Fiat value of the order at its own rate.
    pub fn fiat_value(&self) -> Decimal {
        self.amount.fiat_value(self.rate)
    }
}

impl Keyed for Order {
    fn key(&self) -> &OpaqueId {
        &self.id
    }
}

// ============================================================================
// Market data
// ============================================================================

/// Point-in-time quote for a pair. Carries no identity across ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRate {
    pub pair: CurrencyPair,
    pub rate: Rate,
    pub as_of: DateTime<Utc>,
}

/// One row of the trader leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub volume: Decimal,
    pub trades: u32,
    /// 1-based position after sorting by volume.
    pub rank: u32,
    /// 0.0 ..= 5.0
    pub rating: Decimal,
    pub online: bool,
}

// ============================================================================
// Feed events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderMatched,
    EscrowLocked,
    PaymentReceived,
    RatingReceived,
    PriceAlert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: OpaqueId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub time: DateTime<Utc>,
    pub read: bool,
}

impl Keyed for Notification {
    fn key(&self) -> &OpaqueId {
        &self.id
    }
}

/// Direct message from a (synthetic) counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: OpaqueId,
    pub from: String,
    pub text: String,
    pub time: DateTime<Utc>,
    pub read: bool,
}

impl Keyed for ChatMessage {
    fn key(&self) -> &OpaqueId {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Trade,
    EscrowLocked,
    EscrowReleased,
    NewMerchant,
}

/// Public market activity line ("alice bought 1,200 USDT").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: OpaqueId,
    pub kind: ActivityKind,
    pub actor: String,
    pub amount: Amount,
    pub pair: CurrencyPair,
    pub time: DateTime<Utc>,
    pub read: bool,
}

impl Keyed for ActivityEvent {
    fn key(&self) -> &OpaqueId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_progression_is_linear() {
        assert_eq!(OrderStatus::Pending.next(), Some(OrderStatus::Escrowed));
        assert_eq!(OrderStatus::Escrowed.next(), Some(OrderStatus::Completed));
        assert_eq!(OrderStatus::Completed.next(), None);
        assert!(OrderStatus::Completed.is_terminal());
    }

    #[test]
    fn test_pair_parse() {
        assert_eq!(
            "usdt-aed".parse::<CurrencyPair>().unwrap(),
            CurrencyPair::UsdtAed
        );
        assert_eq!(
            "USDT/INR".parse::<CurrencyPair>().unwrap(),
            CurrencyPair::UsdtInr
        );
        assert!(matches!(
            "BTC/USD".parse::<CurrencyPair>(),
            Err(CoreError::UnknownPair(_))
        ));
    }

    #[test]
    fn test_pair_fiat_and_serde() {
        assert_eq!(CurrencyPair::UsdtNgn.fiat(), "NGN");
        let json = serde_json::to_string(&CurrencyPair::UsdtAed).unwrap();
        assert_eq!(json, "\"USDT/AED\"");
    }
}
