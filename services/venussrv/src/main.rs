//! venussrv entry point.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use venus_model::SignalCatalog;
use venussrv::config::ServiceConfig;
use venussrv::engine::EngineRegistry;

#[derive(Parser, Debug)]
#[command(name = "venussrv", about = "Modbus polling service for Marstek Venus batteries")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "VENUSSRV_CONFIG")]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Check configuration and catalog, then exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config =
        ServiceConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    let level = args.log_level.as_deref().unwrap_or(&config.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    if args.validate {
        let version = config.catalog_version()?;
        let catalog = SignalCatalog::for_version(version)?;
        info!(
            version = %version,
            signals = catalog.len(),
            derived = catalog.derived_signals().len(),
            "configuration and catalog are valid"
        );
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    info!(
        host = %config.device.host,
        port = config.device.port,
        unit_id = config.device.unit_id,
        "starting venussrv"
    );

    let registry = EngineRegistry::new();
    registry
        .create("default", &config)
        .context("failed to start polling engine")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");
    registry.dispose_all().await;
    Ok(())
}
