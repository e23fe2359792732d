//! `SimulationEngine`: the facade the presentation layer talks to.
//!
//! Components are built leaf-first: snapshot hub, lifecycle, market feed,
//! refresh scheduler, then the choreographer that drives the lifecycle.
//! `teardown()` undoes them in reverse and leaves every operation a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use orderflow_core::{CurrencyPair, MarketRate, OpaqueId, OrderId, OrderStatus};

use crate::choreographer::{DemoChoreographer, DemoUiState};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::hub::{EngineSnapshot, SnapshotHub, Subscription};
use crate::lifecycle::{LifecycleSnapshot, OrderLifecycle};
use crate::market::{MarketFeed, MarketFeedSnapshot};
use crate::refresh::PeriodicRefreshScheduler;

/// Buffer sizes at a point in time, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineSummary {
    pub version: u64,
    pub pending: usize,
    pub escrowed: usize,
    pub completed: usize,
    pub demo_queue: usize,
    pub unread_notifications: usize,
    pub unread_messages: usize,
    pub activity: usize,
}

impl EngineSummary {
    fn of(snapshot: &EngineSnapshot) -> Self {
        Self {
            version: snapshot.version,
            pending: snapshot.lifecycle.pending.len(),
            escrowed: snapshot.lifecycle.escrowed.len(),
            completed: snapshot.lifecycle.completed.len(),
            demo_queue: snapshot.market.demo_orders.len(),
            unread_notifications: snapshot.market.unread_notifications(),
            unread_messages: snapshot.market.unread_messages(),
            activity: snapshot.market.activity.len(),
        }
    }
}

pub struct SimulationEngine {
    config: EngineConfig,
    hub: Arc<SnapshotHub>,
    lifecycle: Arc<OrderLifecycle>,
    market: Arc<MarketFeed>,
    refresh: PeriodicRefreshScheduler,
    choreographer: DemoChoreographer,
    started: AtomicBool,
    torn_down: AtomicBool,
}

impl SimulationEngine {
    /// Build every component. Must be called inside a tokio runtime.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let caps = &config.capacities;

        let hub = SnapshotHub::new(
            Arc::new(LifecycleSnapshot::empty(caps)),
            Arc::new(MarketFeedSnapshot::seeded(&mut rng, caps, config.pair)),
        );
        let lifecycle = Arc::new(OrderLifecycle::new(Arc::clone(&hub)));
        let market = Arc::new(MarketFeed::new(
            Arc::clone(&hub),
            rng,
            caps.demo_queue_floor,
        ));
        let refresh = PeriodicRefreshScheduler::new(Arc::clone(&market), config.intervals.clone());
        let choreographer = DemoChoreographer::new(
            Arc::clone(&lifecycle) as _,
            Arc::clone(&market) as _,
            config.demo.clone(),
        )?;

        debug!(
            auto_demo = config.auto_demo,
            seed = ?config.seed,
            pair = %config.pair,
            "Simulation engine built"
        );

        Ok(Self {
            config,
            hub,
            lifecycle,
            market,
            refresh,
            choreographer,
            started: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
        })
    }

    /// Start the refresh timers and the demo cycle when `auto_demo` is set.
    /// Idempotent; without `auto_demo` this does nothing.
    pub fn start(&self) -> EngineResult<()> {
        if self.is_torn_down() {
            return Err(EngineError::TornDown);
        }
        if !self.config.auto_demo {
            debug!("Auto-demo disabled, only user operations will change state");
            return Ok(());
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.refresh.start()?;
        self.choreographer.start_cycle()?;
        info!(
            cycle_ms = self.config.demo.cycle_interval_ms,
            "Simulation engine started"
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Lifecycle operations
    // ------------------------------------------------------------------------

    /// Place an order. `None` for non-positive input or after teardown.
    pub fn place(&self, amount: Decimal, rate: Decimal) -> Option<OrderId> {
        self.lifecycle.place(amount, rate)
    }

    pub fn accept(&self, id: &OrderId) -> bool {
        self.lifecycle.accept(id)
    }

    pub fn send_fiat(&self, id: &OrderId) -> bool {
        self.lifecycle.send_fiat(id)
    }

    pub fn status_of(&self, id: &OrderId) -> Option<OrderStatus> {
        self.lifecycle.status_of(id)
    }

    // ------------------------------------------------------------------------
    // Market operations
    // ------------------------------------------------------------------------

    pub fn set_active_pair(&self, pair: CurrencyPair) -> Option<MarketRate> {
        self.market.set_active_pair(pair)
    }

    pub fn mark_notification_read(&self, id: &OpaqueId) -> bool {
        self.market.mark_notification_read(id)
    }

    pub fn mark_all_notifications_read(&self) -> usize {
        self.market.mark_all_notifications_read()
    }

    pub fn mark_message_read(&self, id: &OpaqueId) -> bool {
        self.market.mark_message_read(id)
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    /// Call `listener` with the current snapshot now and after every change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&EngineSnapshot) + Send + Sync + 'static,
    {
        self.hub.subscribe(listener)
    }

    pub fn watch(&self) -> watch::Receiver<Arc<EngineSnapshot>> {
        self.hub.watch()
    }

    pub fn snapshot(&self) -> Arc<EngineSnapshot> {
        self.hub.current()
    }

    pub fn summary(&self) -> EngineSummary {
        EngineSummary::of(&self.hub.current())
    }

    pub fn demo_ui(&self) -> DemoUiState {
        self.choreographer.ui_state()
    }

    pub fn watch_demo_ui(&self) -> watch::Receiver<DemoUiState> {
        self.choreographer.watch_ui()
    }

    pub fn choreographer(&self) -> &DemoChoreographer {
        &self.choreographer
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Cancel every timer and freeze all state. Idempotent.
    ///
    /// After this returns no buffer changes, whatever was scheduled.
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.choreographer.teardown();
        self.refresh.stop();
        self.lifecycle.close();
        self.market.close();
        let summary = self.summary();
        self.hub.close();
        info!(?summary, "Simulation engine torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }
}

impl Drop for SimulationEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}
