//! WebSocket broadcast functionality.
//!
//! The broadcaster turns engine changes into messages for every connected
//! client: an `update` per engine snapshot, a `demo` per overlay change, and
//! `rate_frame`s that ease the displayed rate toward each new quote.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use orderflow_core::CurrencyPair;
use orderflow_engine::{AnimatedValue, DemoUiState, EngineSnapshot};

use crate::config::DashboardConfig;
use crate::state::DashboardState;
use crate::types::DashboardMessage;

/// Decimal places of a displayed rate.
const RATE_DP: u32 = 4;

pub struct Broadcaster {
    state: DashboardState,
    tx: broadcast::Sender<String>,
    config: DashboardConfig,
    snapshots: watch::Receiver<Arc<EngineSnapshot>>,
    demo: watch::Receiver<DemoUiState>,
}

impl Broadcaster {
    /// Subscribes to the engine immediately, so nothing published after
    /// this call is missed.
    pub fn new(
        state: DashboardState,
        tx: broadcast::Sender<String>,
        config: DashboardConfig,
    ) -> Self {
        let snapshots = state.engine().watch();
        let demo = state.engine().watch_demo_ui();
        Self {
            state,
            tx,
            config,
            snapshots,
            demo,
        }
    }

    /// Run until `shutdown` fires or the engine goes away.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let initial = self.snapshots.borrow().market.rate.clone();
        let mut pair: CurrencyPair = initial.pair;
        let mut rate = AnimatedValue::new(initial.rate.inner(), self.config.rate_animation());
        let mut last_frame: Decimal = rate.target().round_dp(RATE_DP);

        let mut frames = time::interval(self.config.frame_interval());
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Broadcaster shutting down");
                    break;
                }
                changed = self.snapshots.changed() => {
                    if changed.is_err() {
                        debug!("Engine snapshot channel closed");
                        break;
                    }
                    let snapshot = Arc::clone(&self.snapshots.borrow_and_update());
                    let quote = &snapshot.market.rate;
                    if quote.pair != pair {
                        pair = quote.pair;
                        rate = AnimatedValue::new(quote.rate.inner(), self.config.rate_animation());
                    } else if quote.rate.inner() != rate.target() {
                        rate.set_target(quote.rate.inner(), Instant::now());
                    }
                    let view = self.state.render(&snapshot);
                    self.send(&DashboardMessage::Update(Box::new(view)));
                }
                changed = self.demo.changed() => {
                    if changed.is_err() {
                        debug!("Demo UI channel closed");
                        break;
                    }
                    let ui = self.demo.borrow_and_update().clone();
                    self.send(&DashboardMessage::Demo(ui));
                }
                _ = frames.tick() => {
                    let value = rate.value_at(Instant::now()).round_dp(RATE_DP);
                    if value != last_frame {
                        last_frame = value;
                        self.send(&DashboardMessage::RateFrame {
                            timestamp_ms: Utc::now().timestamp_millis(),
                            pair,
                            rate: value,
                            target: rate.target(),
                        });
                    }
                }
            }
        }
    }

    fn send(&self, msg: &DashboardMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => match self.tx.send(json) {
                Ok(n) => trace!(receivers = n, "Broadcast message sent"),
                // No receivers - normal when no clients are connected
                Err(_) => trace!("No WebSocket receivers connected"),
            },
            Err(e) => debug!(error = %e, "Failed to serialize dashboard message"),
        }
    }
}
