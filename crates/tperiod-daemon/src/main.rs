use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use tperiod_core::config::TperiodConfig;
use tperiod_engine::PeriodRegistry;
use tperiod_scheduler::Refresher;

/// Keeps configured time periods computed and rolling forward.
#[derive(Debug, Parser)]
#[command(name = "tperiod-daemon", version)]
struct Cli {
    /// Path to tperiod.toml (default: ~/.tperiod/tperiod.toml).
    #[arg(long, env = "TPERIOD_CONFIG")]
    config: Option<String>,

    /// Pre-fill every period, print all snapshots as JSON and exit.
    #[arg(long)]
    dump: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tperiod_daemon=info,tperiod_engine=info,tperiod_scheduler=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config / TPERIOD_CONFIG > ~/.tperiod/tperiod.toml
    let config = TperiodConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        TperiodConfig::default()
    });

    // every period is pre-filled for the next horizon before anything queries it
    let now = chrono::Utc::now();
    let registry = Arc::new(
        PeriodRegistry::from_config(&config.periods, now, config.refresher.horizon())
            .context("building time period registry")?,
    );
    info!(periods = registry.len(), "time periods loaded");

    if cli.dump {
        println!("{}", registry.snapshots_json(chrono::Utc::now())?);
        return Ok(());
    }

    let refresher = Refresher::new(Arc::clone(&registry), config.refresher.clone())?.spawn();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown signal received");

    // stop the refresher loop, then drop every period
    refresher.shutdown().await?;
    for name in registry.names() {
        registry.unregister(&name);
    }
    Ok(())
}
