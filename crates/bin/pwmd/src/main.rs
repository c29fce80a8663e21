//! # pwmd: PWM irrigation control daemon
//!
//! Composition root that wires the registries, sensors and control loop
//! together and runs the controller.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Initialise `tracing` with an `EnvFilter`
//! - Construct the JSON stores, virtual sensors and outcome bus (adapters)
//! - Start the control loop and the simulated hydraulics
//! - Accept mode commands on stdin (`paddock <id> <mode|next>`, `bay <id> <mode|next>`)
//! - Handle graceful shutdown (SIGINT)
//!
//! `pwmd migrate-settings` rewrites the settings file in the current layout
//! and exits.
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no control logic belongs here.

mod config;

use std::io::BufRead;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use pwm_adapter_json_store::{JsonSettingsStore, JsonTopologyStore};
use pwm_adapter_virtual::{VirtualHydraulics, VirtualLevelSensors};
use pwm_app::control_loop::{ControlHandle, ControlLoop};
use pwm_app::controller::TickOutcome;
use pwm_app::event_bus::InProcessEventBus;
use pwm_app::ports::{SettingsSource, TopologySource};
use pwm_app::resolver;
use pwm_domain::command::ModeCommand;

use crate::config::Config;

const OUTCOME_BUS_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    let topology_store = JsonTopologyStore::new(&config.store.topology_path);
    let settings_store = JsonSettingsStore::new(&config.store.settings_path);

    if std::env::args().nth(1).as_deref() == Some("migrate-settings") {
        let migrated = settings_store
            .migrate()
            .await
            .context("migrating settings")?;
        tracing::info!(migrated, "settings migration finished");
        return Ok(());
    }

    // Sensors, seeded from whatever the registries reference at startup
    let sensors = Arc::new(VirtualLevelSensors::new());
    let topology = topology_store
        .load_topology()
        .await
        .context("loading topology")?;
    let settings = settings_store
        .load_settings()
        .await
        .context("loading settings")?;
    for sensor in resolver::resolve(&topology, &settings).level_sensors() {
        sensors.set_level(sensor, config.simulation.initial_level);
    }

    // Outcome bus
    let bus = Arc::new(InProcessEventBus::new(OUTCOME_BUS_CAPACITY));
    let log_task = tokio::spawn(log_outcomes(bus.subscribe()));
    let hydraulics_task = config.simulation.hydraulics.then(|| {
        let hydraulics = VirtualHydraulics::new(Arc::clone(&sensors), config.simulation.steps);
        tokio::spawn(hydraulics.run(bus.subscribe()))
    });

    // Control loop
    let (control, handle) = ControlLoop::new(
        topology_store,
        settings_store,
        sensors,
        Arc::clone(&bus),
        config.control_loop(),
    );
    let control_task = tokio::spawn(control.run());
    // plain thread: a blocking stdin read must not hold up runtime shutdown
    let input = handle.clone();
    std::thread::Builder::new()
        .name("pwmd-stdin".to_string())
        .spawn(move || read_commands(&input))
        .context("spawning stdin reader")?;

    tracing::info!(
        topology = %config.store.topology_path.display(),
        settings = %config.store.settings_path.display(),
        "pwmd running, waiting for commands on stdin"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutdown requested");
    handle.shutdown();
    control_task.await.context("control loop task")?;

    drop(bus);
    if let Some(task) = hydraulics_task {
        let _ = task.await;
    }
    let _ = log_task.await;
    Ok(())
}

/// Forward stdin lines to the control loop as mode commands.
fn read_commands(handle: &ControlHandle) {
    for line in std::io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(%err, "failed to read stdin");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<ModeCommand>() {
            Ok(command) => {
                tracing::info!(%command, "command received");
                if let Err(err) = handle.blocking_send(command) {
                    tracing::warn!(%err, "command not delivered");
                    break;
                }
            }
            Err(err) => tracing::warn!(%err, "ignoring input line"),
        }
    }
    tracing::debug!("stdin closed");
}

/// Log a one-line summary of every tick.
async fn log_outcomes(mut outcomes: broadcast::Receiver<Arc<TickOutcome>>) {
    loop {
        match outcomes.recv().await {
            Ok(outcome) => {
                for bay in &outcome.bays {
                    tracing::info!(
                        bay = %bay.id,
                        mode = %bay.mode,
                        door = %bay.door,
                        level = ?bay.level,
                        "bay state"
                    );
                }
                for command in &outcome.commands {
                    tracing::debug!(
                        device = %command.device,
                        command = %command.command,
                        bay = %command.bay,
                        "device command"
                    );
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "outcome log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
