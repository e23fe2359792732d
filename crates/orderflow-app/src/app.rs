//! Main application orchestration.
//!
//! Coordinates:
//! - Simulation engine start and teardown
//! - Dashboard server task
//! - Periodic summary logging

use std::future::Future;
use std::sync::Arc;

use orderflow_dashboard::{run_server, DashboardResult, DashboardState};
use orderflow_engine::{EngineSummary, SimulationEngine};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::error::AppResult;

/// Main application.
pub struct Application {
    config: AppConfig,
    engine: Arc<SimulationEngine>,
    shutdown: CancellationToken,
}

impl Application {
    /// Create the engine. Must be called inside a tokio runtime.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let engine = Arc::new(SimulationEngine::new(config.engine.clone())?);
        Ok(Self {
            config,
            engine,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn engine(&self) -> &Arc<SimulationEngine> {
        &self.engine
    }

    /// Token that stops `run` when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until ctrl-c.
    pub async fn run(self) -> AppResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        })
        .await
    }

    /// Run until `stop` completes or the shutdown token is cancelled.
    pub async fn run_until<F>(self, stop: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            auto_demo = self.config.engine.auto_demo,
            seed = ?self.config.engine.seed,
            "Starting application"
        );

        self.engine.start()?;

        let dashboard = self.spawn_dashboard();

        let mut summary_interval = tokio::time::interval(self.config.summary_interval());
        // First tick completes immediately
        summary_interval.tick().await;

        tokio::pin!(stop);
        loop {
            tokio::select! {
                _ = summary_interval.tick() => {
                    log_summary("Periodic summary", &self.engine.summary());
                }
                _ = &mut stop => break,
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        // Cleanup
        self.shutdown.cancel();
        if let Some(handle) = dashboard {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "Dashboard server failed"),
                Err(e) => error!(error = %e, "Dashboard task panicked"),
            }
        }

        self.engine.teardown();
        log_summary("Final summary", &self.engine.summary());
        info!("Shutdown complete");

        Ok(())
    }

    fn spawn_dashboard(&self) -> Option<JoinHandle<DashboardResult<()>>> {
        if !self.config.dashboard.enabled {
            info!("Dashboard disabled");
            return None;
        }
        let state = DashboardState::new(Arc::clone(&self.engine));
        let config = self.config.dashboard.clone();
        let shutdown = self.shutdown.child_token();
        Some(tokio::spawn(run_server(state, config, shutdown)))
    }
}

fn log_summary(message: &str, summary: &EngineSummary) {
    info!(
        version = summary.version,
        pending = summary.pending,
        escrowed = summary.escrowed,
        completed = summary.completed,
        demo_queue = summary.demo_queue,
        unread_notifications = summary.unread_notifications,
        unread_messages = summary.unread_messages,
        activity = summary.activity,
        "{message}"
    );
}
