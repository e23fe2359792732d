//! Periodic market refresh.
//!
//! One repeating timer per feed, all in a single `TimerGroup` so `stop()`
//! is one call. Each feed keeps its own handle and can be stopped alone
//! with `stop_feed`. Feeds tick independently; each feed's own ticks run in
//! order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use orderflow_telemetry::Metrics;

use crate::config::RefreshIntervals;
use crate::error::EngineResult;
use crate::market::MarketFeed;
use crate::scheduler::{TimerGroup, TimerHandle};

type Tick = fn(&MarketFeed);

/// Feed names accepted by `stop_feed`.
pub const FEEDS: [&str; 7] = [
    "market_rate",
    "order_arrival",
    "order_departure",
    "leaderboard",
    "activity",
    "notification",
    "message",
];

struct RunningFeeds {
    group: TimerGroup,
    handles: HashMap<&'static str, TimerHandle>,
}

pub struct PeriodicRefreshScheduler {
    feed: Arc<MarketFeed>,
    intervals: RefreshIntervals,
    timers: Mutex<Option<RunningFeeds>>,
}

impl PeriodicRefreshScheduler {
    pub fn new(feed: Arc<MarketFeed>, intervals: RefreshIntervals) -> Self {
        Self {
            feed,
            intervals,
            timers: Mutex::new(None),
        }
    }

    /// Start every feed timer. Idempotent while running.
    pub fn start(&self) -> EngineResult<()> {
        let mut timers = self.timers.lock();
        if timers.is_some() {
            return Ok(());
        }
        let group = TimerGroup::new("market-refresh")?;

        let feeds: [(&'static str, Duration, Tick); 7] = [
            ("market_rate", self.intervals.market_rate(), |f| {
                f.tick_rate();
            }),
            ("order_arrival", self.intervals.order_arrival(), |f| {
                f.arrive_order();
            }),
            ("order_departure", self.intervals.order_departure(), |f| {
                f.depart_order();
            }),
            ("leaderboard", self.intervals.leaderboard(), |f| {
                f.reshuffle_leaderboard();
            }),
            ("activity", self.intervals.activity(), |f| {
                f.push_activity();
            }),
            ("notification", self.intervals.notification(), |f| {
                f.push_notification();
            }),
            ("message", self.intervals.message(), |f| {
                f.push_message();
            }),
        ];

        let mut handles = HashMap::with_capacity(feeds.len());
        for (name, period, tick) in feeds {
            let feed = Arc::clone(&self.feed);
            let handle = group.schedule_repeating(period, move || {
                trace!(feed = name, "Refresh tick");
                Metrics::feed_tick(name);
                tick(&feed);
            });
            handles.insert(name, handle);
        }

        info!(feeds = handles.len(), "Market refresh started");
        *timers = Some(RunningFeeds { group, handles });
        Ok(())
    }

    /// Cancel every feed timer. No feed mutates after this returns.
    pub fn stop(&self) {
        if let Some(running) = self.timers.lock().take() {
            running.group.cancel_all();
            info!("Market refresh stopped");
        }
    }

    /// Cancel one feed's timer, leaving the others running.
    ///
    /// Returns false for an unknown name, an already stopped feed, or when
    /// the scheduler is not running.
    pub fn stop_feed(&self, name: &str) -> bool {
        let timers = self.timers.lock();
        let Some(handle) = timers.as_ref().and_then(|r| r.handles.get(name)) else {
            debug!(feed = name, "No running feed to stop");
            return false;
        };
        if handle.is_cancelled() {
            return false;
        }
        handle.cancel();
        info!(feed = name, "Refresh feed stopped");
        true
    }

    /// Whether `name` is running and has not been stopped.
    pub fn is_feed_running(&self, name: &str) -> bool {
        self.timers
            .lock()
            .as_ref()
            .and_then(|r| r.handles.get(name))
            .is_some_and(|h| !h.is_cancelled())
    }

    pub fn is_running(&self) -> bool {
        self.timers.lock().is_some()
    }

    pub fn live_timers(&self) -> usize {
        self.timers
            .lock()
            .as_ref()
            .map(|r| r.group.live_timers())
            .unwrap_or(0)
    }
}

impl Drop for PeriodicRefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
