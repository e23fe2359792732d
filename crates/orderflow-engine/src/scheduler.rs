//! Cancellable timer groups.
//!
//! Every component that needs delayed or repeating work owns a
//! `TimerGroup`. The group tracks every task it spawns and cancels all of
//! them on `cancel_all()` or drop, so teardown is one call per component.
//!
//! # Guarantees
//!
//! - A callback runs while holding the group gate. `cancel_all()` takes the
//!   same gate, so once it returns no callback of the group is running and
//!   none will start.
//! - `TimerHandle::cancel()` gives the same guarantee for one timer.
//! - Delays are measured from the moment of scheduling, not from the first
//!   poll of the spawned task.
//!
//! The gate is reentrant: a callback may cancel its own group or handle.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use orderflow_telemetry::Metrics;

use crate::error::{EngineError, EngineResult};

/// Shortest accepted repeat period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

struct GroupShared {
    name: &'static str,
    /// `true` while the group accepts callbacks.
    gate: ReentrantMutex<Cell<bool>>,
    token: CancellationToken,
}

impl GroupShared {
    /// Run `f` unless the group or the timer has been cancelled.
    fn fire<F: FnOnce()>(&self, timer: &CancellationToken, f: F) -> bool {
        let alive = self.gate.lock();
        if !alive.get() || timer.is_cancelled() {
            return false;
        }
        f();
        true
    }
}

/// Keeps the live-timer gauge in step with spawned tasks, including tasks
/// aborted before their first poll.
struct LiveTimer;

impl LiveTimer {
    fn start() -> Self {
        Metrics::timer_started();
        Self
    }
}

impl Drop for LiveTimer {
    fn drop(&mut self) {
        Metrics::timer_finished();
    }
}

/// Handle to a single scheduled timer.
#[derive(Clone)]
pub struct TimerHandle {
    token: CancellationToken,
    shared: Arc<GroupShared>,
}

impl TimerHandle {
    /// Cancel this timer. When this returns its callback is not running and
    /// will not run again.
    pub fn cancel(&self) {
        let _gate = self.shared.gate.lock();
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("group", &self.shared.name)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A set of timers torn down together.
pub struct TimerGroup {
    shared: Arc<GroupShared>,
    runtime: Handle,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TimerGroup {
    /// Create a group on the current tokio runtime.
    pub fn new(name: &'static str) -> EngineResult<Self> {
        let runtime = Handle::try_current().map_err(|e| EngineError::NoRuntime(e.to_string()))?;
        Ok(Self::with_handle(name, runtime))
    }

    /// Create a group that spawns onto `runtime`.
    pub fn with_handle(name: &'static str, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(GroupShared {
                name,
                gate: ReentrantMutex::new(Cell::new(true)),
                token: CancellationToken::new(),
            }),
            runtime,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// Run `f` once after `delay`.
    ///
    /// On a cancelled group this returns an already-cancelled handle and
    /// schedules nothing.
    pub fn schedule_once<F>(&self, delay: Duration, f: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let (timer, handle) = self.new_timer();
        if timer.is_cancelled() {
            return handle;
        }

        let deadline = Instant::now() + delay;
        let shared = Arc::clone(&self.shared);
        let live = LiveTimer::start();
        let task = self.runtime.spawn(async move {
            let _live = live;
            tokio::select! {
                biased;
                _ = timer.cancelled() => {}
                _ = time::sleep_until(deadline) => {
                    shared.fire(&timer, f);
                }
            }
        });
        self.track(task);
        handle
    }

    /// Run `f` every `period`, first after one full period.
    pub fn schedule_repeating<F>(&self, period: Duration, mut f: F) -> TimerHandle
    where
        F: FnMut() + Send + 'static,
    {
        let (timer, handle) = self.new_timer();
        if timer.is_cancelled() {
            return handle;
        }

        let period = period.max(MIN_PERIOD);
        let start = Instant::now() + period;
        let shared = Arc::clone(&self.shared);
        let live = LiveTimer::start();
        let task = self.runtime.spawn(async move {
            let _live = live;
            let mut ticker = time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = timer.cancelled() => break,
                    _ = ticker.tick() => {
                        if !shared.fire(&timer, &mut f) {
                            break;
                        }
                    }
                }
            }
        });
        self.track(task);
        handle
    }

    /// Cancel every timer in the group. Idempotent.
    ///
    /// Blocks until an in-flight callback of this group (on another thread)
    /// has finished.
    pub fn cancel_all(&self) {
        {
            let alive = self.shared.gate.lock();
            if !alive.get() {
                return;
            }
            alive.set(false);
            self.shared.token.cancel();
        }
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        let count = tasks.len();
        for task in tasks {
            task.abort();
        }
        debug!(group = self.shared.name, aborted = count, "Timer group cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    /// Timers spawned by this group that have not finished yet.
    pub fn live_timers(&self) -> usize {
        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.len()
    }

    fn new_timer(&self) -> (CancellationToken, TimerHandle) {
        let timer = self.shared.token.child_token();
        let handle = TimerHandle {
            token: timer.clone(),
            shared: Arc::clone(&self.shared),
        };
        (timer, handle)
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }
}

impl Drop for TimerGroup {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

impl fmt::Debug for TimerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerGroup")
            .field("name", &self.shared.name)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn bump(c: &Arc<AtomicUsize>) -> impl Fn() + Send + 'static {
        let c = Arc::clone(c);
        move || {
            c.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        assert!(matches!(
            TimerGroup::new("no-runtime"),
            Err(EngineError::NoRuntime(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_fires_after_delay() {
        let group = TimerGroup::new("once").unwrap();
        let fired = counter();
        group.schedule_once(Duration::from_millis(1_000), bump(&fired));

        time::sleep(Duration::from_millis(999)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_handle_never_fires() {
        let group = TimerGroup::new("cancel-one").unwrap();
        let fired = counter();
        let kept = counter();
        let handle = group.schedule_once(Duration::from_millis(100), bump(&fired));
        group.schedule_once(Duration::from_millis(100), bump(&kept));
        handle.cancel();
        assert!(handle.is_cancelled());

        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(kept.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_ticks_until_cancelled() {
        let group = TimerGroup::new("repeat").unwrap();
        let ticks = counter();
        let handle = group.schedule_repeating(Duration::from_millis(100), bump(&ticks));

        time::sleep(Duration::from_millis(350)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        handle.cancel();
        time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_stops_everything() {
        let group = TimerGroup::new("all").unwrap();
        let ticks = counter();
        group.schedule_repeating(Duration::from_millis(50), bump(&ticks));
        group.schedule_once(Duration::from_millis(500), bump(&ticks));

        time::sleep(Duration::from_millis(120)).await;
        let seen = ticks.load(Ordering::SeqCst);
        assert_eq!(seen, 2);

        group.cancel_all();
        group.cancel_all();
        assert!(group.is_cancelled());

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
        assert_eq!(group.live_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_on_cancelled_group_is_inert() {
        let group = TimerGroup::new("dead").unwrap();
        group.cancel_all();
        let fired = counter();
        let handle = group.schedule_once(Duration::from_millis(1), bump(&fired));
        assert!(handle.is_cancelled());

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_group() {
        let fired = counter();
        {
            let group = TimerGroup::new("dropped").unwrap();
            group.schedule_repeating(Duration::from_millis(10), bump(&fired));
        }
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_may_cancel_own_timer() {
        let group = TimerGroup::new("self-cancel").unwrap();
        let ticks = counter();
        let slot: Arc<Mutex<Option<TimerHandle>>> = Arc::new(Mutex::new(None));

        let slot_in = Arc::clone(&slot);
        let ticks_in = Arc::clone(&ticks);
        let handle = group.schedule_repeating(Duration::from_millis(10), move || {
            if ticks_in.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
                if let Some(h) = slot_in.lock().as_ref() {
                    h.cancel();
                }
            }
        });
        *slot.lock() = Some(handle);

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_measured_from_schedule_time() {
        let group = TimerGroup::new("offsets").unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        for (i, ms) in [300u64, 100, 200].into_iter().enumerate() {
            let order = Arc::clone(&order);
            group.schedule_once(Duration::from_millis(ms), move || order.lock().push(i));
        }
        time::sleep(Duration::from_millis(400)).await;
        assert_eq!(*order.lock(), vec![1, 2, 0]);
    }
}
