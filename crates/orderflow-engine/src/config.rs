//! Engine configuration.

use std::time::Duration;

use orderflow_core::{Amount, CurrencyPair};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Top-level simulation engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Run the demo choreography and the periodic market refresh.
    /// When false only user-invoked operations change state.
    #[serde(default)]
    pub auto_demo: bool,
    /// Seed for the synthetic feed. `None` seeds from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Pair quoted at startup.
    #[serde(default)]
    pub pair: CurrencyPair,
    #[serde(default)]
    pub capacities: BufferCapacities,
    #[serde(default)]
    pub intervals: RefreshIntervals,
    #[serde(default)]
    pub demo: DemoConfig,
}

impl EngineConfig {
    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> EngineResult<()> {
        self.capacities.validate()?;
        self.intervals.validate()?;
        self.demo.validate()
    }
}

// ============================================================================
// BufferCapacities
// ============================================================================

/// Capacity of every bounded buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferCapacities {
    /// User orders waiting to be accepted.
    #[serde(default = "default_lifecycle_capacity")]
    pub pending_orders: usize,
    /// Orders with funds locked in (simulated) escrow.
    #[serde(default = "default_lifecycle_capacity")]
    pub escrowed_orders: usize,
    /// Finished orders kept for display.
    #[serde(default = "default_lifecycle_capacity")]
    pub completed_orders: usize,
    /// Synthetic order book shown beside the user's orders.
    #[serde(default = "default_demo_queue")]
    pub demo_queue: usize,
    /// Departures stop once the synthetic queue is down to this many orders.
    #[serde(default = "default_demo_queue_floor")]
    pub demo_queue_floor: usize,
    #[serde(default = "default_activity")]
    pub activity: usize,
    #[serde(default = "default_notifications")]
    pub notifications: usize,
    #[serde(default = "default_messages")]
    pub messages: usize,
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
}

fn default_lifecycle_capacity() -> usize {
    10
}

fn default_demo_queue() -> usize {
    8
}

fn default_demo_queue_floor() -> usize {
    2
}

fn default_activity() -> usize {
    5
}

fn default_notifications() -> usize {
    8
}

fn default_messages() -> usize {
    5
}

fn default_leaderboard_size() -> usize {
    10
}

impl Default for BufferCapacities {
    fn default() -> Self {
        Self {
            pending_orders: default_lifecycle_capacity(),
            escrowed_orders: default_lifecycle_capacity(),
            completed_orders: default_lifecycle_capacity(),
            demo_queue: default_demo_queue(),
            demo_queue_floor: default_demo_queue_floor(),
            activity: default_activity(),
            notifications: default_notifications(),
            messages: default_messages(),
            leaderboard_size: default_leaderboard_size(),
        }
    }
}

impl BufferCapacities {
    fn validate(&self) -> EngineResult<()> {
        let named = [
            ("pending_orders", self.pending_orders),
            ("escrowed_orders", self.escrowed_orders),
            ("completed_orders", self.completed_orders),
            ("demo_queue", self.demo_queue),
            ("activity", self.activity),
            ("notifications", self.notifications),
            ("messages", self.messages),
            ("leaderboard_size", self.leaderboard_size),
        ];
        if let Some((name, _)) = named.iter().find(|(_, cap)| *cap == 0) {
            return Err(EngineError::InvalidConfig(format!(
                "capacities.{name} must be at least 1"
            )));
        }
        if self.demo_queue_floor >= self.demo_queue {
            return Err(EngineError::InvalidConfig(format!(
                "capacities.demo_queue_floor ({}) must be below demo_queue ({})",
                self.demo_queue_floor, self.demo_queue
            )));
        }
        Ok(())
    }
}

// ============================================================================
// RefreshIntervals
// ============================================================================

/// Tick period of each synthetic feed, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshIntervals {
    #[serde(default = "default_market_rate_ms")]
    pub market_rate_ms: u64,
    #[serde(default = "default_order_arrival_ms")]
    pub order_arrival_ms: u64,
    #[serde(default = "default_order_departure_ms")]
    pub order_departure_ms: u64,
    #[serde(default = "default_leaderboard_ms")]
    pub leaderboard_ms: u64,
    #[serde(default = "default_activity_ms")]
    pub activity_ms: u64,
    #[serde(default = "default_notification_ms")]
    pub notification_ms: u64,
    #[serde(default = "default_message_ms")]
    pub message_ms: u64,
}

fn default_market_rate_ms() -> u64 {
    3_500
}

fn default_order_arrival_ms() -> u64 {
    5_000
}

fn default_order_departure_ms() -> u64 {
    7_000
}

fn default_leaderboard_ms() -> u64 {
    6_000
}

fn default_activity_ms() -> u64 {
    4_000
}

fn default_notification_ms() -> u64 {
    8_000
}

fn default_message_ms() -> u64 {
    10_000
}

impl Default for RefreshIntervals {
    fn default() -> Self {
        Self {
            market_rate_ms: default_market_rate_ms(),
            order_arrival_ms: default_order_arrival_ms(),
            order_departure_ms: default_order_departure_ms(),
            leaderboard_ms: default_leaderboard_ms(),
            activity_ms: default_activity_ms(),
            notification_ms: default_notification_ms(),
            message_ms: default_message_ms(),
        }
    }
}

impl RefreshIntervals {
    fn validate(&self) -> EngineResult<()> {
        let named = [
            ("market_rate_ms", self.market_rate_ms),
            ("order_arrival_ms", self.order_arrival_ms),
            ("order_departure_ms", self.order_departure_ms),
            ("leaderboard_ms", self.leaderboard_ms),
            ("activity_ms", self.activity_ms),
            ("notification_ms", self.notification_ms),
            ("message_ms", self.message_ms),
        ];
        match named.iter().find(|(_, ms)| *ms == 0) {
            Some((name, _)) => Err(EngineError::InvalidConfig(format!(
                "intervals.{name} must be positive"
            ))),
            None => Ok(()),
        }
    }

    pub fn market_rate(&self) -> Duration {
        Duration::from_millis(self.market_rate_ms)
    }

    pub fn order_arrival(&self) -> Duration {
        Duration::from_millis(self.order_arrival_ms)
    }

    pub fn order_departure(&self) -> Duration {
        Duration::from_millis(self.order_departure_ms)
    }

    pub fn leaderboard(&self) -> Duration {
        Duration::from_millis(self.leaderboard_ms)
    }

    pub fn activity(&self) -> Duration {
        Duration::from_millis(self.activity_ms)
    }

    pub fn notification(&self) -> Duration {
        Duration::from_millis(self.notification_ms)
    }

    pub fn message(&self) -> Duration {
        Duration::from_millis(self.message_ms)
    }
}

// ============================================================================
// DemoConfig
// ============================================================================

/// Timing of the scripted demo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Period between demo activations (screens rotate Buy → Accept → SendFiat).
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,
    /// Pause between pointer moves.
    #[serde(default = "default_step_ms")]
    pub step_ms: u64,
    /// Delay between typed characters.
    #[serde(default = "default_typing_interval_ms")]
    pub typing_interval_ms: u64,
    /// How long the button stays visually pressed before the action fires.
    #[serde(default = "default_press_ms")]
    pub press_ms: u64,
    /// Amounts the Buy script types, used in rotation.
    #[serde(default = "default_amounts")]
    pub amounts: Vec<Decimal>,
}

fn default_cycle_interval_ms() -> u64 {
    6_000
}

fn default_step_ms() -> u64 {
    500
}

fn default_typing_interval_ms() -> u64 {
    120
}

fn default_press_ms() -> u64 {
    200
}

fn default_amounts() -> Vec<Decimal> {
    vec![
        Decimal::from(5_000),
        Decimal::from(1_200),
        Decimal::new(75_050, 2),
    ]
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: default_cycle_interval_ms(),
            step_ms: default_step_ms(),
            typing_interval_ms: default_typing_interval_ms(),
            press_ms: default_press_ms(),
            amounts: default_amounts(),
        }
    }
}

impl DemoConfig {
    fn validate(&self) -> EngineResult<()> {
        if self.cycle_interval_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "demo.cycle_interval_ms must be positive".to_string(),
            ));
        }
        if self.amounts.is_empty() {
            return Err(EngineError::InvalidConfig(
                "demo.amounts must not be empty".to_string(),
            ));
        }
        for amount in &self.amounts {
            Amount::positive(*amount)?;
        }
        Ok(())
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = EngineConfig::default();
        assert!(!config.auto_demo);
        assert_eq!(config.capacities.demo_queue, 8);
        assert_eq!(config.capacities.activity, 5);
        assert_eq!(config.capacities.notifications, 8);
        assert_eq!(config.capacities.messages, 5);
        assert_eq!(config.intervals.market_rate_ms, 3_500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            auto_demo = true
            seed = 42
            pair = "USDT/INR"

            [capacities]
            demo_queue = 4

            [intervals]
            market_rate_ms = 1000
            "#,
        )
        .unwrap();
        assert!(config.auto_demo);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.pair, CurrencyPair::UsdtInr);
        assert_eq!(config.capacities.demo_queue, 4);
        assert_eq!(config.capacities.messages, 5);
        assert_eq!(config.intervals.market_rate_ms, 1000);
        assert_eq!(config.intervals.leaderboard_ms, 6_000);
        assert_eq!(config.demo, DemoConfig::default());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = EngineConfig::default();
        config.capacities.messages = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("capacities.messages"));
    }

    #[test]
    fn test_floor_must_be_below_queue() {
        let mut config = EngineConfig::default();
        config.capacities.demo_queue_floor = 8;
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = EngineConfig::default();
        config.intervals.order_departure_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_demo_amount_rejected() {
        let mut config = EngineConfig::default();
        config.demo.amounts = vec![Decimal::ZERO];
        assert!(matches!(config.validate(), Err(EngineError::Core(_))));
    }
}
