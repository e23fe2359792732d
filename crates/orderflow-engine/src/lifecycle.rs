//! Order lifecycle state machine.
//!
//! Owns the pending, escrowed and completed buffers. An order's status is
//! the buffer that holds it; it moves `Pending → Escrowed → Completed` and
//! never back.
//!
//! All three buffers live in one immutable `LifecycleSnapshot` that is
//! swapped as a whole on every change, so a reader sees each order in
//! exactly one buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use orderflow_core::{Amount, BoundedBuffer, Order, OrderId, OrderOrigin, OrderStatus, Rate};
use orderflow_feed::generate_id;
use orderflow_telemetry::Metrics;

use crate::choreographer::ActionDispatch;
use crate::config::BufferCapacities;
use crate::hub::SnapshotHub;

/// Immutable view of the three lifecycle buffers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleSnapshot {
    pub version: u64,
    pub pending: BoundedBuffer<Order>,
    pub escrowed: BoundedBuffer<Order>,
    pub completed: BoundedBuffer<Order>,
}

impl LifecycleSnapshot {
    pub fn empty(caps: &BufferCapacities) -> Self {
        Self {
            version: 0,
            pending: BoundedBuffer::new(caps.pending_orders),
            escrowed: BoundedBuffer::new(caps.escrowed_orders),
            completed: BoundedBuffer::new(caps.completed_orders),
        }
    }

    pub fn buffer(&self, status: OrderStatus) -> &BoundedBuffer<Order> {
        match status {
            OrderStatus::Pending => &self.pending,
            OrderStatus::Escrowed => &self.escrowed,
            OrderStatus::Completed => &self.completed,
        }
    }

    fn buffer_mut(&mut self, status: OrderStatus) -> &mut BoundedBuffer<Order> {
        match status {
            OrderStatus::Pending => &mut self.pending,
            OrderStatus::Escrowed => &mut self.escrowed,
            OrderStatus::Completed => &mut self.completed,
        }
    }

    /// Stage of `id`, derived from the buffer holding it.
    pub fn status_of(&self, id: &OrderId) -> Option<OrderStatus> {
        [
            OrderStatus::Pending,
            OrderStatus::Escrowed,
            OrderStatus::Completed,
        ]
        .into_iter()
        .find(|s| self.buffer(*s).contains(id))
    }

    pub fn find(&self, id: &OrderId) -> Option<(&Order, OrderStatus)> {
        let status = self.status_of(id)?;
        self.buffer(status).get(id).map(|o| (o, status))
    }

    /// Orders across all three buffers.
    pub fn total(&self) -> usize {
        self.pending.len() + self.escrowed.len() + self.completed.len()
    }
}

/// The single mutation point for user orders.
pub struct OrderLifecycle {
    state: RwLock<Arc<LifecycleSnapshot>>,
    hub: Arc<SnapshotHub>,
    closed: AtomicBool,
}

impl OrderLifecycle {
    /// Start from the lifecycle view the hub currently holds.
    pub fn new(hub: Arc<SnapshotHub>) -> Self {
        let initial = Arc::clone(&hub.current().lifecycle);
        Self {
            state: RwLock::new(initial),
            hub,
            closed: AtomicBool::new(false),
        }
    }

    /// Create a pending order. Returns `None` for a non-positive amount or
    /// rate, or once the lifecycle is closed.
    pub fn place(&self, amount: Decimal, rate: Decimal) -> Option<OrderId> {
        if self.is_closed() {
            return None;
        }
        let Ok(amount) = Amount::positive(amount) else {
            debug!(%amount, "Rejected order with non-positive amount");
            Metrics::order_rejected("amount");
            return None;
        };
        let Ok(rate) = Rate::positive(rate) else {
            debug!(%rate, "Rejected order with non-positive rate");
            Metrics::order_rejected("rate");
            return None;
        };

        let order = Order {
            id: generate_id(),
            amount,
            rate,
            timestamp: Utc::now(),
            origin: OrderOrigin::User,
            trader: None,
        };
        let id = order.id.clone();

        let next = {
            let mut state = self.state.write();
            let mut next = (**state).clone();
            let (pending, evicted) = next.pending.push_evicting(order);
            next.pending = pending;
            next.version += 1;
            if let Some(old) = evicted {
                warn!(order_id = %old.id, "Pending buffer full, evicted oldest order");
                Metrics::evicted("pending");
            }
            let next = Arc::new(next);
            *state = Arc::clone(&next);
            next
        };

        info!(order_id = %id, %amount, %rate, "Order placed");
        Metrics::order_placed();
        self.hub.publish_lifecycle(next);
        Some(id)
    }

    /// Move `id` from Pending to Escrowed.
    pub fn accept(&self, id: &OrderId) -> bool {
        self.advance(id, OrderStatus::Pending, "accept")
    }

    /// Move `id` from Escrowed to Completed.
    pub fn send_fiat(&self, id: &OrderId) -> bool {
        self.advance(id, OrderStatus::Escrowed, "send_fiat")
    }

    fn advance(&self, id: &OrderId, from: OrderStatus, operation: &'static str) -> bool {
        if self.is_closed() {
            return false;
        }
        let Some(to) = from.next() else {
            return false;
        };

        let next = {
            let mut state = self.state.write();
            let (removed, source) = state.buffer(from).find_and_remove(id);
            let Some(order) = removed else {
                drop(state);
                debug!(order_id = %id, operation, "Order not in expected buffer, ignoring");
                Metrics::stale_reference(operation);
                return false;
            };

            let mut next = (**state).clone();
            let (target, evicted) = next.buffer(to).push_evicting(order);
            *next.buffer_mut(from) = source;
            *next.buffer_mut(to) = target;
            next.version += 1;
            if let Some(old) = evicted {
                debug!(order_id = %old.id, buffer = %to, "Evicted oldest order");
                Metrics::evicted(status_label(to));
            }
            let next = Arc::new(next);
            *state = Arc::clone(&next);
            next
        };

        info!(order_id = %id, %from, %to, "Order advanced");
        Metrics::transition(status_label(from), status_label(to));
        self.hub.publish_lifecycle(next);
        true
    }

    pub fn snapshot(&self) -> Arc<LifecycleSnapshot> {
        Arc::clone(&self.state.read())
    }

    pub fn status_of(&self, id: &OrderId) -> Option<OrderStatus> {
        self.state.read().status_of(id)
    }

    /// Most recently placed order still pending.
    pub fn latest_pending(&self) -> Option<OrderId> {
        self.state.read().pending.first().map(|o| o.id.clone())
    }

    /// Most recently escrowed order still escrowed.
    pub fn latest_escrowed(&self) -> Option<OrderId> {
        self.state.read().escrowed.first().map(|o| o.id.clone())
    }

    /// Turn every further operation into a no-op.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn status_label(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending",
        OrderStatus::Escrowed => "escrowed",
        OrderStatus::Completed => "completed",
    }
}

impl ActionDispatch for OrderLifecycle {
    fn place(&self, amount: Decimal, rate: Decimal) -> Option<OrderId> {
        OrderLifecycle::place(self, amount, rate)
    }

    fn accept(&self, id: &OrderId) -> bool {
        OrderLifecycle::accept(self, id)
    }

    fn send_fiat(&self, id: &OrderId) -> bool {
        OrderLifecycle::send_fiat(self, id)
    }

    fn latest_pending(&self) -> Option<OrderId> {
        OrderLifecycle::latest_pending(self)
    }

    fn latest_escrowed(&self) -> Option<OrderId> {
        OrderLifecycle::latest_escrowed(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MarketFeedSnapshot;
    use rust_decimal_macros::dec;

    fn lifecycle_with(caps: BufferCapacities) -> OrderLifecycle {
        let hub = SnapshotHub::new(
            Arc::new(LifecycleSnapshot::empty(&caps)),
            Arc::new(MarketFeedSnapshot::empty(&caps)),
        );
        OrderLifecycle::new(hub)
    }

    fn lifecycle() -> OrderLifecycle {
        lifecycle_with(BufferCapacities::default())
    }

    #[test]
    fn test_happy_path() {
        let lc = lifecycle();
        let id = lc.place(dec!(5000), dec!(3.67)).unwrap();

        let snap = lc.snapshot();
        let order = snap.pending.get(&id).unwrap();
        assert_eq!(order.amount.inner(), dec!(5000));
        assert_eq!(order.rate.inner(), dec!(3.67));
        assert_eq!(order.origin, OrderOrigin::User);
        assert_eq!(lc.status_of(&id), Some(OrderStatus::Pending));

        assert!(lc.accept(&id));
        let snap = lc.snapshot();
        assert!(!snap.pending.contains(&id));
        assert!(snap.escrowed.contains(&id));

        assert!(lc.send_fiat(&id));
        let snap = lc.snapshot();
        assert!(!snap.escrowed.contains(&id));
        assert!(snap.completed.contains(&id));
        assert_eq!(lc.status_of(&id), Some(OrderStatus::Completed));
    }

    #[test]
    fn test_rejected_input_leaves_state_alone() {
        let lc = lifecycle();
        let before = lc.snapshot();
        assert!(lc.place(dec!(0), dec!(3.67)).is_none());
        assert!(lc.place(dec!(-10), dec!(3.67)).is_none());
        assert!(lc.place(dec!(100), dec!(0)).is_none());
        assert_eq!(lc.snapshot(), before);
    }

    #[test]
    fn test_stale_action_is_noop() {
        let lc = lifecycle();
        lc.place(dec!(10), dec!(3.67)).unwrap();
        let before = lc.snapshot();
        assert!(!lc.accept(&OrderId::from("nonexistent-id")));
        assert!(!lc.send_fiat(&OrderId::from("nonexistent-id")));
        assert_eq!(lc.snapshot().version, before.version);
    }

    #[test]
    fn test_double_fire_succeeds_once() {
        let lc = lifecycle();
        let id = lc.place(dec!(10), dec!(3.67)).unwrap();
        assert!(lc.accept(&id));
        let after_first = lc.snapshot();
        assert!(!lc.accept(&id));
        assert_eq!(lc.snapshot(), after_first);

        assert!(lc.send_fiat(&id));
        assert!(!lc.send_fiat(&id));
    }

    #[test]
    fn test_no_skipping_stages() {
        let lc = lifecycle();
        let id = lc.place(dec!(10), dec!(3.67)).unwrap();
        assert!(!lc.send_fiat(&id));
        assert_eq!(lc.status_of(&id), Some(OrderStatus::Pending));
    }

    #[test]
    fn test_latest_targets_track_newest() {
        let lc = lifecycle();
        assert!(lc.latest_pending().is_none());
        let a = lc.place(dec!(1), dec!(3.6)).unwrap();
        let b = lc.place(dec!(2), dec!(3.6)).unwrap();
        assert_eq!(lc.latest_pending(), Some(b.clone()));

        lc.accept(&a);
        assert_eq!(lc.latest_escrowed(), Some(a));
        assert_eq!(lc.latest_pending(), Some(b));
    }

    #[test]
    fn test_pending_capacity_evicts_oldest() {
        let caps = BufferCapacities {
            pending_orders: 2,
            ..BufferCapacities::default()
        };
        let lc = lifecycle_with(caps);
        let first = lc.place(dec!(1), dec!(3.6)).unwrap();
        lc.place(dec!(2), dec!(3.6)).unwrap();
        lc.place(dec!(3), dec!(3.6)).unwrap();

        let snap = lc.snapshot();
        assert_eq!(snap.pending.len(), 2);
        assert!(!snap.pending.contains(&first));
        assert!(!lc.accept(&first));
    }

    #[test]
    fn test_versions_increase_per_change() {
        let lc = lifecycle();
        let v0 = lc.snapshot().version;
        let id = lc.place(dec!(1), dec!(3.6)).unwrap();
        let v1 = lc.snapshot().version;
        lc.accept(&id);
        let v2 = lc.snapshot().version;
        assert!(v0 < v1 && v1 < v2);
    }

    #[test]
    fn test_publishes_to_hub() {
        let caps = BufferCapacities::default();
        let hub = SnapshotHub::new(
            Arc::new(LifecycleSnapshot::empty(&caps)),
            Arc::new(MarketFeedSnapshot::empty(&caps)),
        );
        let lc = OrderLifecycle::new(Arc::clone(&hub));
        let id = lc.place(dec!(7), dec!(3.6)).unwrap();
        assert!(hub.current().lifecycle.pending.contains(&id));
    }

    #[test]
    fn test_closed_lifecycle_ignores_operations() {
        let lc = lifecycle();
        let id = lc.place(dec!(7), dec!(3.6)).unwrap();
        lc.close();
        let before = lc.snapshot();
        assert!(lc.place(dec!(7), dec!(3.6)).is_none());
        assert!(!lc.accept(&id));
        assert_eq!(lc.snapshot(), before);
    }
}
