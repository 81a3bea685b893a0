//! `dock-sim`: the station firmware on a desktop.
//!
//! The wireless link, broker session and NFC reader are the in-process mocks
//! from `dock_hardware::mock`; time and persistence are real.

mod cli;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dock_core::StationConfig;
use dock_firmware::{Peripherals, Station};
use dock_hardware::SystemClock;
use dock_hardware::mock::{MockNfc, MockTransport, MockWireless};
use dock_storage::{Database, DatabaseConfig, SqliteStateStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(run(cli))
}

fn load_config(cli: &Cli) -> Result<StationConfig> {
    let mut config = match &cli.config {
        Some(path) => StationConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => StationConfig::default(),
    }
    .with_env_overrides();

    if let Some(database) = &cli.database {
        config.storage.database_path = database.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    info!(
        device = %config.device_id,
        database = %config.storage.database_path.display(),
        "Starting simulator"
    );

    let db = Database::new(DatabaseConfig::from_storage_config(&config.storage))
        .await
        .context("failed to open state database")?;
    let store = SqliteStateStore::new(db.pool().clone());

    let (wifi, wifi_handle) = MockWireless::new();
    if !cli.offline {
        wifi_handle.set_reconnect_succeeds(true);
    }
    let (transport, transport_handle) = MockTransport::new();
    let (nfc, _nfc_handle) = MockNfc::new();

    let peripherals = Peripherals {
        clock: SystemClock::new(),
        wifi,
        transport,
        nfc,
    };
    let mut station =
        Station::new(config, peripherals, store).context("failed to build station")?;

    let boot = station.boot().await;
    info!(
        link = boot.link_up,
        transport = boot.transport_connected,
        restart_hint = ?boot.restart_hint,
        "Boot complete"
    );

    let period = Duration::from_millis(station.config().loop_period_ms);
    let limit = cli.iterations;
    tokio::select! {
        _ = async {
            while limit.is_none_or(|n| station.iterations() < n) {
                station.run_once().await;
                tokio::time::sleep(period).await;
            }
        } => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Interrupted");
        }
    }

    let telemetry = station.telemetry().stats();
    info!(
        state = %station.state(),
        iterations = station.iterations(),
        transitions = station.lifecycle().transition_count(),
        status_publishes = transport_handle.published_to(station.topics().status()).len(),
        telemetry_published = telemetry.published,
        telemetry_evicted = telemetry.evicted,
        "Simulator stopped"
    );

    db.close().await;
    Ok(())
}
