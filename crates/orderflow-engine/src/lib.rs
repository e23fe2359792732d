//! Order lifecycle simulation engine.
//!
//! Keeps a small in-memory market alive for a dashboard:
//! - `lifecycle`: Pending → Escrowed → Completed state machine for user orders
//! - `market` / `refresh`: Synthetic rate, order queue, leaderboard and feeds
//!   churned by independent repeating timers
//! - `choreographer`: Scripted auto-demo that drives the lifecycle through
//!   the same operations a user would
//! - `hub`: Versioned snapshots delivered to subscribers
//! - `scheduler`: Timer groups that cancel as a unit
//! - `interpolate`: Eased transitions for displayed numbers
//!
//! `SimulationEngine` wires them together. Nothing here blocks: every
//! operation completes synchronously and waiting is only ever a scheduled
//! callback.

pub mod choreographer;
pub mod config;
pub mod engine;
pub mod error;
pub mod hub;
pub mod interpolate;
pub mod lifecycle;
pub mod market;
pub mod refresh;
pub mod scheduler;

pub use choreographer::{
    ActionDispatch, BusinessAction, DemoAction, DemoChoreographer, DemoScreen, DemoStep,
    DemoTimeline, DemoTimelineBuilder, DemoUiState, PointerTarget, QuoteSource,
};
pub use config::{BufferCapacities, DemoConfig, EngineConfig, RefreshIntervals};
pub use engine::{EngineSummary, SimulationEngine};
pub use error::{EngineError, EngineResult};
pub use hub::{EngineSnapshot, SnapshotHub, Subscription};
pub use interpolate::{ease_out_cubic, frames, AnimatedValue};
pub use lifecycle::{LifecycleSnapshot, OrderLifecycle};
pub use market::{MarketFeed, MarketFeedSnapshot};
pub use refresh::PeriodicRefreshScheduler;
pub use scheduler::{TimerGroup, TimerHandle};
