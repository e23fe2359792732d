//! Dashboard state management.
//!
//! `DashboardState` turns engine snapshots into the JSON views the browser
//! renders, and forwards user actions to the engine.

use std::sync::Arc;

use chrono::Utc;

use orderflow_core::{BoundedBuffer, Order, OrderStatus};
use orderflow_engine::{EngineSnapshot, SimulationEngine};

use crate::types::{ActivityView, DashboardSnapshot, LeaderboardView, OrderView, RateView};

#[derive(Clone)]
pub struct DashboardState {
    engine: Arc<SimulationEngine>,
}

impl DashboardState {
    pub fn new(engine: Arc<SimulationEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &SimulationEngine {
        &self.engine
    }

    /// Dashboard view of the engine's current state.
    pub fn collect_snapshot(&self) -> DashboardSnapshot {
        self.render(&self.engine.snapshot())
    }

    /// Dashboard view of `snapshot`.
    pub fn render(&self, snapshot: &EngineSnapshot) -> DashboardSnapshot {
        let lifecycle = &snapshot.lifecycle;
        let market = &snapshot.market;
        DashboardSnapshot {
            timestamp_ms: Utc::now().timestamp_millis(),
            version: snapshot.version,
            rate: RateView::from(&market.rate),
            pending: views(&lifecycle.pending, Some(OrderStatus::Pending)),
            escrowed: views(&lifecycle.escrowed, Some(OrderStatus::Escrowed)),
            completed: views(&lifecycle.completed, Some(OrderStatus::Completed)),
            demo_orders: views(&market.demo_orders, None),
            leaderboard: market.leaderboard.iter().map(LeaderboardView::from).collect(),
            notifications: market.notifications.iter().cloned().collect(),
            unread_notifications: market.unread_notifications(),
            messages: market.messages.iter().cloned().collect(),
            unread_messages: market.unread_messages(),
            activity: market.activity.iter().map(ActivityView::from).collect(),
            demo: self.engine.demo_ui(),
        }
    }
}

fn views(buffer: &BoundedBuffer<Order>, status: Option<OrderStatus>) -> Vec<OrderView> {
    buffer.iter().map(|o| OrderView::new(o, status)).collect()
}
