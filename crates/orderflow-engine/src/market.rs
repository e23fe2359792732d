//! Synthetic market state.
//!
//! Holds everything the refresh timers churn: the live rate, the demo-only
//! order queue, the leaderboard and the notification, message and activity
//! feeds. User orders never live here; they belong to `OrderLifecycle`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, trace};

use orderflow_core::{
    ActivityEvent, BoundedBuffer, ChatMessage, CurrencyPair, LeaderboardEntry, MarketRate,
    Notification, OpaqueId, Order, OrderId,
};
use orderflow_feed::{
    generate_activities, generate_activity, generate_leaderboard, generate_market_rate,
    generate_message, generate_messages, generate_notification, generate_notifications,
    generate_order_for_pair, rank_entries,
};
use orderflow_telemetry::Metrics;

use crate::choreographer::QuoteSource;
use crate::config::BufferCapacities;
use crate::hub::SnapshotHub;

/// Leaderboard volume change per reshuffle, in basis points.
const RESHUFFLE_MIN_BPS: i64 = -200;
const RESHUFFLE_MAX_BPS: i64 = 500;

/// Chance that a trader's online flag flips on a reshuffle.
const ONLINE_FLIP_PROBABILITY: f64 = 0.1;

const INITIAL_NOTIFICATIONS: usize = 3;
const INITIAL_MESSAGES: usize = 2;

/// Immutable view of the synthetic market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketFeedSnapshot {
    pub version: u64,
    pub rate: MarketRate,
    /// Synthetic order book, newest first.
    pub demo_orders: BoundedBuffer<Order>,
    /// Sorted by volume descending, ranks `1..=n`.
    pub leaderboard: Vec<LeaderboardEntry>,
    pub notifications: BoundedBuffer<Notification>,
    pub messages: BoundedBuffer<ChatMessage>,
    pub activity: BoundedBuffer<ActivityEvent>,
}

impl MarketFeedSnapshot {
    /// Empty feeds quoting the baseline rate of the default pair.
    pub fn empty(caps: &BufferCapacities) -> Self {
        let pair = CurrencyPair::default();
        Self {
            version: 0,
            rate: MarketRate {
                pair,
                rate: pair.baseline_rate(),
                as_of: chrono::Utc::now(),
            },
            demo_orders: BoundedBuffer::new(caps.demo_queue),
            leaderboard: Vec::new(),
            notifications: BoundedBuffer::new(caps.notifications),
            messages: BoundedBuffer::new(caps.messages),
            activity: BoundedBuffer::new(caps.activity),
        }
    }

    /// Partly filled feeds so the first render is not blank.
    pub fn seeded<R: Rng + ?Sized>(
        rng: &mut R,
        caps: &BufferCapacities,
        pair: CurrencyPair,
    ) -> Self {
        let demo_orders = (0..caps.demo_queue / 2)
            .map(|_| generate_order_for_pair(rng, pair))
            .collect::<Vec<_>>();
        Self {
            version: 0,
            rate: generate_market_rate(rng, Some(pair)),
            demo_orders: BoundedBuffer::from_items(caps.demo_queue, demo_orders),
            leaderboard: generate_leaderboard(rng, caps.leaderboard_size),
            notifications: BoundedBuffer::from_items(
                caps.notifications,
                generate_notifications(rng, INITIAL_NOTIFICATIONS.min(caps.notifications)),
            ),
            messages: BoundedBuffer::from_items(
                caps.messages,
                generate_messages(rng, INITIAL_MESSAGES.min(caps.messages)),
            ),
            activity: BoundedBuffer::from_items(
                caps.activity,
                generate_activities(rng, caps.activity),
            ),
        }
    }

    pub fn unread_notifications(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }

    pub fn unread_messages(&self) -> usize {
        self.messages.iter().filter(|m| !m.read).count()
    }
}

/// Owner of the synthetic market state.
///
/// Lock order: rng, then state.
pub struct MarketFeed {
    state: RwLock<Arc<MarketFeedSnapshot>>,
    rng: Mutex<StdRng>,
    demo_queue_floor: usize,
    hub: Arc<SnapshotHub>,
    closed: AtomicBool,
}

impl MarketFeed {
    /// Start from the market view the hub currently holds.
    pub fn new(hub: Arc<SnapshotHub>, rng: StdRng, demo_queue_floor: usize) -> Self {
        let initial = Arc::clone(&hub.current().market);
        Self {
            state: RwLock::new(initial),
            rng: Mutex::new(rng),
            demo_queue_floor,
            hub,
            closed: AtomicBool::new(false),
        }
    }

    /// Apply `f` to a copy of the state. `f` returns `None` to leave the
    /// state untouched; otherwise the copy is versioned and published.
    fn mutate<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&mut MarketFeedSnapshot, &mut StdRng) -> Option<T>,
    {
        if self.is_closed() {
            return None;
        }
        let (out, next) = {
            let mut rng = self.rng.lock();
            let mut state = self.state.write();
            let mut next = (**state).clone();
            let out = f(&mut next, &mut *rng)?;
            next.version = state.version + 1;
            let next = Arc::new(next);
            *state = Arc::clone(&next);
            (out, next)
        };
        self.hub.publish_market(next);
        Some(out)
    }

    /// Replace the live rate with a fresh quote for the active pair.
    pub fn tick_rate(&self) -> Option<MarketRate> {
        self.mutate(|s, rng| {
            s.rate = generate_market_rate(rng, Some(s.rate.pair));
            trace!(pair = %s.rate.pair, rate = %s.rate.rate, "Market rate tick");
            Some(s.rate.clone())
        })
    }

    /// Switch the quoted pair, regenerating the rate at once.
    pub fn set_active_pair(&self, pair: CurrencyPair) -> Option<MarketRate> {
        self.mutate(|s, rng| {
            s.rate = generate_market_rate(rng, Some(pair));
            debug!(%pair, rate = %s.rate.rate, "Active pair changed");
            Some(s.rate.clone())
        })
    }

    /// Generate a synthetic order on the active pair and queue it.
    pub fn arrive_order(&self) -> Option<OrderId> {
        self.mutate(|s, rng| {
            let order = generate_order_for_pair(rng, s.rate.pair);
            Some(enqueue(s, order))
        })
    }

    /// Queue an existing synthetic order.
    pub fn push_demo_order(&self, order: Order) -> Option<OrderId> {
        self.mutate(|s, _| Some(enqueue(s, order)))
    }

    /// Drop the oldest synthetic order, unless the queue is at its floor.
    pub fn depart_order(&self) -> Option<Order> {
        let floor = self.demo_queue_floor;
        self.mutate(|s, _| {
            if s.demo_orders.len() <= floor {
                return None;
            }
            let (removed, rest) = s.demo_orders.pop_oldest();
            s.demo_orders = rest;
            if let Some(order) = &removed {
                trace!(order_id = %order.id, "Synthetic order departed");
            }
            removed
        })
    }

    /// Nudge every volume, then re-sort and re-rank.
    pub fn reshuffle_leaderboard(&self) -> Option<()> {
        self.mutate(|s, rng| {
            for entry in &mut s.leaderboard {
                let bps = rng.gen_range(RESHUFFLE_MIN_BPS..=RESHUFFLE_MAX_BPS);
                let delta = entry.volume * Decimal::new(bps, 4);
                entry.volume = (entry.volume + delta).max(Decimal::ZERO).round_dp(0);
                entry.trades = entry.trades.saturating_add(rng.gen_range(0..=3));
                if rng.gen_bool(ONLINE_FLIP_PROBABILITY) {
                    entry.online = !entry.online;
                }
            }
            rank_entries(&mut s.leaderboard);
            trace!(entries = s.leaderboard.len(), "Leaderboard reshuffled");
            Some(())
        })
    }

    pub fn push_activity(&self) -> Option<OpaqueId> {
        self.mutate(|s, rng| {
            let event = generate_activity(rng);
            let id = event.id.clone();
            let (activity, evicted) = s.activity.push_evicting(event);
            s.activity = activity;
            if evicted.is_some() {
                Metrics::evicted("activity");
            }
            Some(id)
        })
    }

    pub fn push_notification(&self) -> Option<OpaqueId> {
        self.mutate(|s, rng| {
            let note = generate_notification(rng);
            let id = note.id.clone();
            let (notifications, evicted) = s.notifications.push_evicting(note);
            s.notifications = notifications;
            if evicted.is_some() {
                Metrics::evicted("notifications");
            }
            Some(id)
        })
    }

    pub fn push_message(&self) -> Option<OpaqueId> {
        self.mutate(|s, rng| {
            let message = generate_message(rng);
            let id = message.id.clone();
            let (messages, evicted) = s.messages.push_evicting(message);
            s.messages = messages;
            if evicted.is_some() {
                Metrics::evicted("messages");
            }
            Some(id)
        })
    }

    /// Returns `false` if the id is unknown or already read.
    pub fn mark_notification_read(&self, id: &OpaqueId) -> bool {
        self.mutate(|s, _| {
            if s.notifications.get(id)?.read {
                return None;
            }
            s.notifications = s.notifications.update(id, |n| n.read = true)?;
            Some(())
        })
        .is_some()
    }

    /// Returns how many notifications changed.
    pub fn mark_all_notifications_read(&self) -> usize {
        self.mutate(|s, _| {
            let unread = s.unread_notifications();
            if unread == 0 {
                return None;
            }
            s.notifications = BoundedBuffer::from_items(
                s.notifications.capacity(),
                s.notifications.iter().cloned().map(|mut n| {
                    n.read = true;
                    n
                }),
            );
            Some(unread)
        })
        .unwrap_or(0)
    }

    pub fn mark_message_read(&self, id: &OpaqueId) -> bool {
        self.mutate(|s, _| {
            if s.messages.get(id)?.read {
                return None;
            }
            s.messages = s.messages.update(id, |m| m.read = true)?;
            Some(())
        })
        .is_some()
    }

    pub fn snapshot(&self) -> Arc<MarketFeedSnapshot> {
        Arc::clone(&self.state.read())
    }

    pub fn active_pair(&self) -> CurrencyPair {
        self.state.read().rate.pair
    }

    /// Turn every further mutation into a no-op.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn enqueue(s: &mut MarketFeedSnapshot, order: Order) -> OrderId {
    let id = order.id.clone();
    let (queue, evicted) = s.demo_orders.push_evicting(order);
    s.demo_orders = queue;
    if let Some(old) = evicted {
        trace!(order_id = %old.id, "Demo queue full, evicted oldest");
        Metrics::evicted("demo_queue");
    }
    id
}

impl QuoteSource for MarketFeed {
    fn current_rate(&self) -> MarketRate {
        self.state.read().rate.clone()
    }
}
