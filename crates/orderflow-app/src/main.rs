//! orderflow - Order lifecycle simulation engine with a browser dashboard.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use orderflow_app::config::{CONFIG_ENV, DEFAULT_CONFIG_PATH};
use orderflow_app::{AppConfig, Application};

/// Order lifecycle simulation engine
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via ORDERFLOW_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Run the scripted demo and the periodic market refresh
    #[arg(long)]
    auto_demo: bool,

    /// Seed for the synthetic feed
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    orderflow_telemetry::init_logging()?;

    info!("Starting orderflow v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > ORDERFLOW_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    info!(config_path = %config_path, "Loading configuration");

    let mut config = AppConfig::load(&config_path)?;
    if args.auto_demo {
        config.engine.auto_demo = true;
    }
    if args.seed.is_some() {
        config.engine.seed = args.seed;
    }
    info!(
        auto_demo = config.engine.auto_demo,
        dashboard = %config.dashboard.bind_addr(),
        "Configuration loaded"
    );

    let app = Application::new(config)?;
    app.run().await?;

    Ok(())
}
