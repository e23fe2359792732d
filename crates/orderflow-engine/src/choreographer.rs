//! Scripted auto-demo.
//!
//! A `DemoTimeline` is a list of `(offset, action)` steps for one screen.
//! Presentation steps (pointer, typing, press) only touch `DemoUiState`;
//! business steps go through an `ActionDispatch`, so the script can be
//! tested against a recording dispatcher without any rendering.
//!
//! Each activation runs in its own `TimerGroup`. Activating again cancels
//! the previous group before the new one is scheduled, and every step also
//! checks that its run is still current, so two runs never both dispatch.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info};

use orderflow_core::{MarketRate, OrderId};
use orderflow_telemetry::Metrics;

use crate::config::DemoConfig;
use crate::error::{EngineError, EngineResult};
use crate::scheduler::TimerGroup;

// ============================================================================
// Seams
// ============================================================================

/// Business operations the demo script may invoke.
pub trait ActionDispatch: Send + Sync {
    fn place(&self, amount: Decimal, rate: Decimal) -> Option<OrderId>;
    fn accept(&self, id: &OrderId) -> bool;
    fn send_fiat(&self, id: &OrderId) -> bool;
    /// Most recently created order still pending.
    fn latest_pending(&self) -> Option<OrderId>;
    /// Most recently escrowed order still escrowed.
    fn latest_escrowed(&self) -> Option<OrderId>;
}

/// Where the Buy script reads the rate it types against.
pub trait QuoteSource: Send + Sync {
    fn current_rate(&self) -> MarketRate;
}

// ============================================================================
// Timeline
// ============================================================================

/// Screen a demo run animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DemoScreen {
    Buy,
    Accept,
    SendFiat,
}

impl DemoScreen {
    pub const ROTATION: [DemoScreen; 3] =
        [DemoScreen::Buy, DemoScreen::Accept, DemoScreen::SendFiat];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Accept => "accept",
            Self::SendFiat => "send_fiat",
        }
    }
}

impl fmt::Display for DemoScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// UI element the synthetic pointer points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerTarget {
    AmountInput,
    PlaceButton,
    PendingOrder,
    AcceptButton,
    EscrowedOrder,
    SendFiatButton,
}

/// Business operation fired by a timeline step.
///
/// Accept and send-fiat name no id: the target is looked up when the step
/// fires, so a run never acts on an order that has since moved on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusinessAction {
    Place { amount: Decimal, rate: Decimal },
    AcceptLatestPending,
    SendFiatLatestEscrowed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemoAction {
    ShowPointer(PointerTarget),
    MovePointer(PointerTarget),
    TypeChar(char),
    Press,
    Release,
    Dispatch(BusinessAction),
    /// Hide the pointer and clear transient UI flags.
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoStep {
    /// Offset from activation.
    pub offset: Duration,
    pub action: DemoAction,
}

/// Steps with non-decreasing offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoTimeline {
    steps: Vec<DemoStep>,
}

impl DemoTimeline {
    pub fn builder() -> DemoTimelineBuilder {
        DemoTimelineBuilder::default()
    }

    pub fn steps(&self) -> &[DemoStep] {
        &self.steps
    }

    /// Offset of the last step.
    pub fn duration(&self) -> Duration {
        self.steps.last().map(|s| s.offset).unwrap_or_default()
    }

    /// Script for `screen`. `amount` and `rate` feed the Buy screen only.
    pub fn for_screen(
        screen: DemoScreen,
        config: &DemoConfig,
        amount: Decimal,
        rate: Decimal,
    ) -> EngineResult<Self> {
        let step = Duration::from_millis(config.step_ms);
        let typing = Duration::from_millis(config.typing_interval_ms);
        let press = Duration::from_millis(config.press_ms);

        let (start, button, business) = match screen {
            DemoScreen::Buy => (
                PointerTarget::AmountInput,
                PointerTarget::PlaceButton,
                BusinessAction::Place { amount, rate },
            ),
            DemoScreen::Accept => (
                PointerTarget::PendingOrder,
                PointerTarget::AcceptButton,
                BusinessAction::AcceptLatestPending,
            ),
            DemoScreen::SendFiat => (
                PointerTarget::EscrowedOrder,
                PointerTarget::SendFiatButton,
                BusinessAction::SendFiatLatestEscrowed,
            ),
        };

        let mut builder = Self::builder().at(Duration::ZERO, DemoAction::ShowPointer(start));
        if screen == DemoScreen::Buy {
            for (i, ch) in amount.normalize().to_string().chars().enumerate() {
                let gap = if i == 0 { step } else { typing };
                builder = builder.after(gap, DemoAction::TypeChar(ch));
            }
        }
        builder
            .after(step, DemoAction::MovePointer(button))
            .after(step, DemoAction::Press)
            .after(press, DemoAction::Dispatch(business))
            .after(Duration::ZERO, DemoAction::Release)
            .after(step, DemoAction::Reset)
            .build()
    }
}

#[derive(Debug, Default)]
pub struct DemoTimelineBuilder {
    steps: Vec<DemoStep>,
    cursor: Duration,
    error: Option<String>,
}

impl DemoTimelineBuilder {
    /// Step at an absolute offset. An offset earlier than the previous
    /// step makes `build()` fail.
    pub fn at(mut self, offset: Duration, action: DemoAction) -> Self {
        if offset < self.cursor && self.error.is_none() {
            self.error = Some(format!(
                "step {} at {:?} precedes previous step at {:?}",
                self.steps.len(),
                offset,
                self.cursor
            ));
        }
        self.cursor = self.cursor.max(offset);
        self.steps.push(DemoStep { offset, action });
        self
    }

    /// Step `delay` after the previous one.
    pub fn after(self, delay: Duration, action: DemoAction) -> Self {
        let offset = self.cursor + delay;
        self.at(offset, action)
    }

    pub fn build(self) -> EngineResult<DemoTimeline> {
        match self.error {
            Some(reason) => Err(EngineError::InvalidTimeline(reason)),
            None => Ok(DemoTimeline { steps: self.steps }),
        }
    }
}

// ============================================================================
// UI state
// ============================================================================

/// Presentation state of the demo overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DemoUiState {
    /// 0 when no run has started.
    pub run_id: u64,
    pub screen: Option<DemoScreen>,
    pub pointer_visible: bool,
    pub pointer_target: Option<PointerTarget>,
    pub typed_input: String,
    pub pressing: bool,
    /// Last order the demo placed.
    pub last_order: Option<OrderId>,
}

// ============================================================================
// Choreographer
// ============================================================================

struct ActiveRun {
    id: u64,
    screen: DemoScreen,
    timers: TimerGroup,
}

#[derive(Default)]
struct Rotation {
    screen: usize,
    amount: usize,
}

struct ChoreoShared {
    dispatch: Arc<dyn ActionDispatch>,
    quotes: Arc<dyn QuoteSource>,
    config: DemoConfig,
    runtime: Handle,
    ui_tx: watch::Sender<DemoUiState>,
    next_run: AtomicU64,
    /// Id of the run allowed to fire, 0 for none.
    current_id: AtomicU64,
    current: Mutex<Option<ActiveRun>>,
    rotation: Mutex<Rotation>,
    closed: AtomicBool,
}

impl ChoreoShared {
    fn activate(self: &Arc<Self>, screen: DemoScreen) -> EngineResult<u64> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::TornDown);
        }

        let amount = self.next_amount(screen);
        let rate = self.quotes.current_rate().rate.inner();
        let timeline = DemoTimeline::for_screen(screen, &self.config, amount, rate)?;
        let run_id = self.next_run.fetch_add(1, Ordering::Relaxed) + 1;

        let mut current = self.current.lock();
        if let Some(prior) = current.take() {
            prior.timers.cancel_all();
            debug!(run_id = prior.id, screen = %prior.screen, "Superseded demo run");
        }
        self.current_id.store(run_id, Ordering::Release);

        let last_order = self.ui_tx.borrow().last_order.clone();
        self.ui_tx.send_replace(DemoUiState {
            run_id,
            screen: Some(screen),
            last_order,
            ..DemoUiState::default()
        });

        let timers = TimerGroup::with_handle("demo-run", self.runtime.clone());
        for step in timeline.steps() {
            let shared = Arc::downgrade(self);
            let action = step.action.clone();
            timers.schedule_once(step.offset, move || {
                if let Some(shared) = Weak::upgrade(&shared) {
                    shared.apply(run_id, action);
                }
            });
        }
        *current = Some(ActiveRun {
            id: run_id,
            screen,
            timers,
        });
        drop(current);

        Metrics::demo_run(screen.label());
        info!(run_id, %screen, steps = timeline.steps().len(), "Demo run activated");
        Ok(run_id)
    }

    fn next_amount(&self, screen: DemoScreen) -> Decimal {
        if screen != DemoScreen::Buy {
            return Decimal::ZERO;
        }
        let mut rotation = self.rotation.lock();
        let amounts = &self.config.amounts;
        let amount = amounts
            .get(rotation.amount % amounts.len().max(1))
            .copied()
            .unwrap_or(Decimal::ONE);
        rotation.amount = rotation.amount.wrapping_add(1);
        amount
    }

    fn next_screen(&self) -> DemoScreen {
        let mut rotation = self.rotation.lock();
        let screen = DemoScreen::ROTATION[rotation.screen % DemoScreen::ROTATION.len()];
        rotation.screen = rotation.screen.wrapping_add(1);
        screen
    }

    fn apply(&self, run_id: u64, action: DemoAction) {
        if self.current_id.load(Ordering::Acquire) != run_id {
            return;
        }
        match action {
            DemoAction::Dispatch(business) => {
                let placed = self.dispatch_business(run_id, business);
                if placed.is_some() {
                    self.update_ui(run_id, |ui| ui.last_order = placed);
                }
            }
            DemoAction::ShowPointer(target) => self.update_ui(run_id, |ui| {
                ui.pointer_visible = true;
                ui.pointer_target = Some(target);
            }),
            DemoAction::MovePointer(target) => {
                self.update_ui(run_id, |ui| ui.pointer_target = Some(target))
            }
            DemoAction::TypeChar(ch) => self.update_ui(run_id, |ui| ui.typed_input.push(ch)),
            DemoAction::Press => self.update_ui(run_id, |ui| ui.pressing = true),
            DemoAction::Release => self.update_ui(run_id, |ui| ui.pressing = false),
            DemoAction::Reset => self.update_ui(run_id, |ui| {
                ui.pointer_visible = false;
                ui.pointer_target = None;
                ui.typed_input.clear();
                ui.pressing = false;
            }),
        }
    }

    /// Returns the id of a newly placed order.
    fn dispatch_business(&self, run_id: u64, business: BusinessAction) -> Option<OrderId> {
        match business {
            BusinessAction::Place { amount, rate } => {
                let id = self.dispatch.place(amount, rate);
                debug!(run_id, order_id = ?id, "Demo placed order");
                id
            }
            BusinessAction::AcceptLatestPending => {
                match self.dispatch.latest_pending() {
                    Some(id) => {
                        let ok = self.dispatch.accept(&id);
                        debug!(run_id, order_id = %id, ok, "Demo accepted order");
                    }
                    None => debug!(run_id, "No pending order for demo accept"),
                }
                None
            }
            BusinessAction::SendFiatLatestEscrowed => {
                match self.dispatch.latest_escrowed() {
                    Some(id) => {
                        let ok = self.dispatch.send_fiat(&id);
                        debug!(run_id, order_id = %id, ok, "Demo sent fiat");
                    }
                    None => debug!(run_id, "No escrowed order for demo send-fiat"),
                }
                None
            }
        }
    }

    fn update_ui<F: FnOnce(&mut DemoUiState)>(&self, run_id: u64, f: F) {
        self.ui_tx.send_if_modified(|ui| {
            if ui.run_id != run_id {
                return false;
            }
            f(ui);
            true
        });
    }

    fn cancel_run(&self) -> bool {
        let prior = self.current.lock().take();
        self.current_id.store(0, Ordering::Release);
        let Some(prior) = prior else {
            return false;
        };
        prior.timers.cancel_all();
        self.ui_tx.send_modify(|ui| {
            ui.pointer_visible = false;
            ui.pointer_target = None;
            ui.typed_input.clear();
            ui.pressing = false;
        });
        debug!(run_id = prior.id, "Demo run cancelled");
        true
    }
}

/// Drives demo runs, either on request or on a fixed cycle.
pub struct DemoChoreographer {
    shared: Arc<ChoreoShared>,
    cycle: Mutex<Option<TimerGroup>>,
}

impl DemoChoreographer {
    pub fn new(
        dispatch: Arc<dyn ActionDispatch>,
        quotes: Arc<dyn QuoteSource>,
        config: DemoConfig,
    ) -> EngineResult<Self> {
        let runtime = Handle::try_current().map_err(|e| EngineError::NoRuntime(e.to_string()))?;
        let (ui_tx, _) = watch::channel(DemoUiState::default());
        Ok(Self {
            shared: Arc::new(ChoreoShared {
                dispatch,
                quotes,
                config,
                runtime,
                ui_tx,
                next_run: AtomicU64::new(0),
                current_id: AtomicU64::new(0),
                current: Mutex::new(None),
                rotation: Mutex::new(Rotation::default()),
                closed: AtomicBool::new(false),
            }),
            cycle: Mutex::new(None),
        })
    }

    /// Start a run for `screen`, cancelling any run still in flight.
    pub fn activate(&self, screen: DemoScreen) -> EngineResult<u64> {
        self.shared.activate(screen)
    }

    /// Start a run for the next screen in the Buy → Accept → SendFiat rotation.
    pub fn activate_next(&self) -> EngineResult<u64> {
        let screen = self.shared.next_screen();
        self.shared.activate(screen)
    }

    /// Activate the next screen now and again every `cycle_interval`.
    /// Idempotent while a cycle is running.
    pub fn start_cycle(&self) -> EngineResult<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(EngineError::TornDown);
        }
        let mut cycle = self.cycle.lock();
        if cycle.is_some() {
            return Ok(());
        }

        self.activate_next()?;

        let group = TimerGroup::with_handle("demo-cycle", self.shared.runtime.clone());
        let shared = Arc::downgrade(&self.shared);
        group.schedule_repeating(self.shared.config.cycle_interval(), move || {
            let Some(shared) = Weak::upgrade(&shared) else {
                return;
            };
            let screen = shared.next_screen();
            if let Err(e) = shared.activate(screen) {
                debug!(error = %e, "Demo cycle activation skipped");
            }
        });
        *cycle = Some(group);
        info!(
            interval_ms = self.shared.config.cycle_interval_ms,
            "Demo cycle started"
        );
        Ok(())
    }

    pub fn stop_cycle(&self) {
        if let Some(group) = self.cycle.lock().take() {
            group.cancel_all();
            info!("Demo cycle stopped");
        }
    }

    pub fn is_cycling(&self) -> bool {
        self.cycle.lock().is_some()
    }

    /// Cancel the run in flight, if any.
    pub fn cancel_run(&self) -> bool {
        self.shared.cancel_run()
    }

    /// Cancel the cycle and the current run; further activations fail.
    pub fn teardown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop_cycle();
        self.shared.cancel_run();
        debug!("Demo choreographer torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub fn ui_state(&self) -> DemoUiState {
        self.shared.ui_tx.borrow().clone()
    }

    pub fn watch_ui(&self) -> watch::Receiver<DemoUiState> {
        self.shared.ui_tx.subscribe()
    }

    /// Run id allowed to fire, `None` when idle.
    pub fn current_run(&self) -> Option<u64> {
        match self.shared.current_id.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    /// Steps of the current run not yet fired.
    pub fn pending_steps(&self) -> usize {
        self.shared
            .current
            .lock()
            .as_ref()
            .map(|run| run.timers.live_timers())
            .unwrap_or(0)
    }
}

impl Drop for DemoChoreographer {
    fn drop(&mut self) {
        self.teardown();
    }
}
