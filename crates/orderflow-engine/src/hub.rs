//! Snapshot distribution.
//!
//! The lifecycle and the market feed each publish immutable snapshots here.
//! The hub combines the latest of each into an `EngineSnapshot` and hands it
//! to callback listeners and to a `watch` channel.
//!
//! Every published snapshot carries the version of the component that made
//! it. A publish older than what the hub already holds is dropped, so
//! observers never go back in time even when two writers race to publish.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use orderflow_telemetry::Metrics;

use crate::lifecycle::LifecycleSnapshot;
use crate::market::MarketFeedSnapshot;

/// Combined view of every buffer in the engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    /// Bumped on every accepted publish.
    pub version: u64,
    pub lifecycle: Arc<LifecycleSnapshot>,
    pub market: Arc<MarketFeedSnapshot>,
}

type Listener = Arc<dyn Fn(&EngineSnapshot) + Send + Sync>;

struct ListenerEntry {
    callback: Listener,
    active: Arc<AtomicBool>,
    /// Highest hub version delivered to this listener.
    seen: Arc<AtomicU64>,
}

/// Fan-out point for engine snapshots.
pub struct SnapshotHub {
    current: RwLock<Arc<EngineSnapshot>>,
    listeners: Mutex<BTreeMap<u64, ListenerEntry>>,
    next_listener: AtomicU64,
    watch_tx: watch::Sender<Arc<EngineSnapshot>>,
    closed: AtomicBool,
}

impl SnapshotHub {
    pub fn new(lifecycle: Arc<LifecycleSnapshot>, market: Arc<MarketFeedSnapshot>) -> Arc<Self> {
        let initial = Arc::new(EngineSnapshot {
            version: 0,
            lifecycle,
            market,
        });
        let (watch_tx, _) = watch::channel(Arc::clone(&initial));
        Arc::new(Self {
            current: RwLock::new(initial),
            listeners: Mutex::new(BTreeMap::new()),
            next_listener: AtomicU64::new(1),
            watch_tx,
            closed: AtomicBool::new(false),
        })
    }

    /// Latest combined snapshot.
    pub fn current(&self) -> Arc<EngineSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Replace the lifecycle view. Returns `false` if the snapshot is not
    /// newer than the one held, or the hub is closed.
    pub fn publish_lifecycle(&self, lifecycle: Arc<LifecycleSnapshot>) -> bool {
        self.publish(|cur| {
            (lifecycle.version > cur.lifecycle.version).then(|| EngineSnapshot {
                version: cur.version + 1,
                lifecycle: Arc::clone(&lifecycle),
                market: Arc::clone(&cur.market),
            })
        })
    }

    /// Replace the market view. Same rules as `publish_lifecycle`.
    pub fn publish_market(&self, market: Arc<MarketFeedSnapshot>) -> bool {
        self.publish(|cur| {
            (market.version > cur.market.version).then(|| EngineSnapshot {
                version: cur.version + 1,
                lifecycle: Arc::clone(&cur.lifecycle),
                market: Arc::clone(&market),
            })
        })
    }

    fn publish<F>(&self, build: F) -> bool
    where
        F: FnOnce(&EngineSnapshot) -> Option<EngineSnapshot>,
    {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let next = {
            let mut current = self.current.write();
            let Some(next) = build(&current) else {
                debug!(version = current.version, "Dropped stale snapshot publish");
                return false;
            };
            let next = Arc::new(next);
            *current = Arc::clone(&next);
            next
        };

        self.watch_tx.send_if_modified(|held| {
            if next.version > held.version {
                *held = Arc::clone(&next);
                true
            } else {
                false
            }
        });
        self.deliver(&next);
        true
    }

    fn deliver(&self, snapshot: &EngineSnapshot) {
        // Clone out so listeners may subscribe, unsubscribe or publish.
        let targets: Vec<(Listener, Arc<AtomicBool>, Arc<AtomicU64>)> = self
            .listeners
            .lock()
            .values()
            .map(|e| {
                (
                    Arc::clone(&e.callback),
                    Arc::clone(&e.active),
                    Arc::clone(&e.seen),
                )
            })
            .collect();

        for (callback, active, seen) in targets {
            if !active.load(Ordering::Acquire) {
                continue;
            }
            if seen.fetch_max(snapshot.version, Ordering::AcqRel) >= snapshot.version {
                continue;
            }
            callback(snapshot);
        }
    }

    /// Register `listener`. It is called with the current snapshot before
    /// this returns, then after every accepted publish.
    ///
    /// On a closed hub nothing is registered and the returned subscription
    /// is already inactive.
    pub fn subscribe<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&EngineSnapshot) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        let callback: Listener = Arc::new(listener);
        let active = Arc::new(AtomicBool::new(true));
        let seen = Arc::new(AtomicU64::new(0));

        let count = {
            let mut listeners = self.listeners.lock();
            // Checked under the lock so `close` cannot miss this entry.
            if self.is_closed() {
                drop(listeners);
                debug!(listener = id, "Subscribe on closed hub ignored");
                active.store(false, Ordering::Release);
                return Subscription {
                    id,
                    hub: Arc::downgrade(self),
                    active,
                };
            }
            listeners.insert(
                id,
                ListenerEntry {
                    callback: Arc::clone(&callback),
                    active: Arc::clone(&active),
                    seen: Arc::clone(&seen),
                },
            );
            listeners.len()
        };
        Metrics::subscribers_set(count);
        debug!(listener = id, subscribers = count, "Listener subscribed");

        let snapshot = self.current();
        // A publish racing with registration may already have delivered
        // something newer.
        let prev = seen.fetch_max(snapshot.version, Ordering::AcqRel);
        if prev == 0 || prev < snapshot.version {
            callback(&snapshot);
        }

        Subscription {
            id,
            hub: Arc::downgrade(self),
            active,
        }
    }

    /// Async view of the same snapshots.
    pub fn watch(&self) -> watch::Receiver<Arc<EngineSnapshot>> {
        self.watch_tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Stop accepting publishes and drop every listener.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let dropped = {
            let mut listeners = self.listeners.lock();
            for entry in listeners.values() {
                entry.active.store(false, Ordering::Release);
            }
            let n = listeners.len();
            listeners.clear();
            n
        };
        Metrics::subscribers_set(0);
        debug!(dropped, "Snapshot hub closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn remove(&self, id: u64) {
        let count = {
            let mut listeners = self.listeners.lock();
            listeners.remove(&id);
            listeners.len()
        };
        Metrics::subscribers_set(count);
        debug!(listener = id, subscribers = count, "Listener unsubscribed");
    }
}

impl fmt::Debug for SnapshotHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotHub")
            .field("version", &self.current.read().version)
            .field("listeners", &self.listener_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Registration returned by `SnapshotHub::subscribe`.
///
/// Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    hub: Weak<SnapshotHub>,
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Stop delivery. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
