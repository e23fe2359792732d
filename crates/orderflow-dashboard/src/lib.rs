//! orderflow-dashboard - Browser front end for the simulation engine.
//!
//! This crate adapts `SimulationEngine` to HTTP. It includes:
//!
//! - REST API for snapshots and user actions (place, accept, send fiat)
//! - WebSocket stream of engine updates, demo overlay changes and eased
//!   rate animation frames
//! - Static HTML page
//! - Prometheus text endpoint
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        orderflow process                      │
//! │                                                              │
//! │  ┌──────────────────────────────────────────────────────┐    │
//! │  │ SimulationEngine (lifecycle, market, demo, hub)      │    │
//! │  └───────────────┬──────────────────────────┬───────────┘    │
//! │          actions │                  watch   │                 │
//! │  ┌───────────────┴─────────┐  ┌─────────────▼────────────┐    │
//! │  │ REST handlers           │  │ Broadcaster              │    │
//! │  └─────────────────────────┘  └─────────────┬────────────┘    │
//! │                                    broadcast│                 │
//! │  ┌──────────────────────────────────────────▼────────────┐    │
//! │  │ axum HTTP server                                      │    │
//! │  │  GET  /                → Static HTML                  │    │
//! │  │  GET  /api/snapshot    → JSON state                   │    │
//! │  │  POST /api/orders      → place an order               │    │
//! │  │  GET  /ws              → WebSocket upgrade            │    │
//! │  └───────────────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use orderflow_dashboard::{run_server, DashboardConfig, DashboardState};
//!
//! let state = DashboardState::new(engine.clone());
//! let shutdown = CancellationToken::new();
//! tokio::spawn(run_server(state, DashboardConfig::default(), shutdown.child_token()));
//! ```

mod broadcast;
mod config;
mod error;
mod server;
mod state;
mod types;

pub use broadcast::Broadcaster;
pub use config::DashboardConfig;
pub use error::{DashboardError, DashboardResult};
pub use server::{create_router, run_server, serve_on, AppState};
pub use state::DashboardState;
pub use types::{
    ActivityView, DashboardMessage, DashboardSnapshot, ErrorResponse, LeaderboardView,
    OkResponse, OrderView, PairView, PlaceOrderRequest, PlaceOrderResponse, RateView,
    SetPairRequest, UpdatedResponse,
};
