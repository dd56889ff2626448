//! OPC UA tag simulator binary.
//!
//! This is the main entry point that wires together the protocol
//! server, its simulation loop and the observer API. It loads
//! configuration, initializes logging, serves the observer until
//! Ctrl-C and then stops everything cleanly.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `opcsim-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the simulator and the observer state
//! 4. Start the protocol server if `server.autostart` is set
//! 5. Spawn the observer API server
//! 6. Wait for Ctrl-C, then stop the observer and the simulator

mod error;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use opcsim_core::SimulatorConfig;
use opcsim_core::config::LoggingConfig;
use opcsim_observer::AppState;
use opcsim_observer::startup::spawn_observer;
use opcsim_server::{Simulator, StopOutcome};
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Name of the configuration file in the working directory.
const CONFIG_FILE: &str = "opcsim-config.yaml";

/// How long the observer gets to drain requests on shutdown.
const OBSERVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Application entry point for the simulator.
///
/// # Errors
///
/// Returns an error if configuration, logging, autostart or the
/// observer bind fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!("opcsim-engine starting");
    info!(
        endpoint = %config.server.endpoint_url(),
        server_name = %config.server.server_name,
        max_sessions = config.server.max_sessions,
        tick_interval_ms = config.simulation.tick_interval_ms,
        broadcast_interval_ms = config.simulation.broadcast_interval_ms,
        variables = config.variables.len(),
        "Configuration loaded"
    );

    // 3. Create the simulator and observer state.
    let simulator = Arc::new(Simulator::new(
        config.server.clone(),
        config.simulation.clone(),
    ));
    let state = Arc::new(AppState::new(
        Arc::clone(&simulator),
        config.variables.clone(),
    ));

    // 4. Autostart the protocol server.
    if config.server.autostart {
        let endpoint = simulator
            .start(&config.variables)
            .await
            .map_err(EngineError::from)?;
        info!(%endpoint, "Protocol server autostarted");
    }

    // 5. Spawn the observer.
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (observer_addr, observer) = spawn_observer(&config.observer, state, async move {
        shutdown_rx.await.ok();
    })
    .await
    .map_err(EngineError::from)?;
    info!(%observer_addr, "Observer API ready");

    // 6. Wait for Ctrl-C.
    tokio::signal::ctrl_c().await.map_err(EngineError::from)?;
    info!("Shutdown signal received");

    shutdown_tx.send(()).ok();
    if tokio::time::timeout(OBSERVER_DRAIN_TIMEOUT, observer)
        .await
        .is_err()
    {
        warn!("Observer did not drain in time");
    }

    match simulator.stop().await {
        StopOutcome::Stopped(report) => info!(clean = report.is_clean(), "Simulator stopped"),
        StopOutcome::AlreadyStopped => info!("Simulator was not running"),
    }

    info!("opcsim-engine exited");
    Ok(())
}

/// Load configuration from `opcsim-config.yaml`.
///
/// Falls back to defaults (demo variables included) when the file does
/// not exist. Environment overrides apply either way.
fn load_config() -> Result<SimulatorConfig, EngineError> {
    let config_path = Path::new(CONFIG_FILE);
    if config_path.exists() {
        Ok(SimulatorConfig::from_file(config_path)?)
    } else {
        let mut config = SimulatorConfig::default();
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| EngineError::Logging {
        message: e.to_string(),
    })
}
