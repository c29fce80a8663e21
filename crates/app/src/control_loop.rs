//! Async control loop: drives [`FarmController`] from the ports.
//!
//! Each tick loads topology and settings, reads every referenced level sensor
//! concurrently under a single deadline, applies the pending mode commands,
//! evaluates the farm and publishes the outcome. The loop ticks on a fixed
//! interval and also right away when a command or sensor-change notification
//! arrives through the [`ControlHandle`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

use pwm_domain::command::ModeCommand;
use pwm_domain::error::{CommandError, PwmError};
use pwm_domain::id::DeviceId;
use pwm_domain::snapshot::LevelReadings;
use pwm_domain::time::Timestamp;

use crate::controller::{FarmController, TickOutcome};
use crate::ports::{LevelSensorReader, OutcomePublisher, SettingsSource, TopologySource};
use crate::resolver;

const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Timing of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLoopConfig {
    pub tick_interval: Duration,
    /// Budget for all sensor reads of one tick.
    pub sensor_deadline: Duration,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(30),
            sensor_deadline: Duration::from_secs(2),
        }
    }
}

/// Cloneable handle for talking to a running [`ControlLoop`].
#[derive(Debug, Clone)]
pub struct ControlHandle {
    commands: mpsc::Sender<ModeCommand>,
    wake: Arc<Notify>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ControlHandle {
    /// Queue a mode command and wake the loop.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::LoopStopped`] if the loop is gone.
    pub async fn send(&self, command: ModeCommand) -> Result<(), PwmError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CommandError::LoopStopped)?;
        self.wake.notify_one();
        Ok(())
    }

    /// Blocking variant of [`send`](Self::send) for threads outside the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::LoopStopped`] if the loop is gone.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async execution context.
    pub fn blocking_send(&self, command: ModeCommand) -> Result<(), PwmError> {
        self.commands
            .blocking_send(command)
            .map_err(|_| CommandError::LoopStopped)?;
        self.wake.notify_one();
        Ok(())
    }

    /// Ask for an immediate tick because a sensor value changed.
    pub fn notify_sensor_change(&self) {
        self.wake.notify_one();
    }

    /// Stop the loop after the tick in progress.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

/// The control loop task.
pub struct ControlLoop<T, S, R, P> {
    topology: T,
    settings: S,
    sensors: Arc<R>,
    publisher: P,
    config: ControlLoopConfig,
    controller: FarmController,
    commands: mpsc::Receiver<ModeCommand>,
    wake: Arc<Notify>,
    shutdown: watch::Receiver<bool>,
}

impl<T, S, R, P> ControlLoop<T, S, R, P>
where
    T: TopologySource + Send + Sync,
    S: SettingsSource + Send + Sync,
    R: LevelSensorReader + Send + Sync + 'static,
    P: OutcomePublisher + Send + Sync,
{
    /// Create the loop and the handle used to drive it.
    #[must_use]
    pub fn new(
        topology: T,
        settings: S,
        sensors: Arc<R>,
        publisher: P,
        config: ControlLoopConfig,
    ) -> (Self, ControlHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let wake = Arc::new(Notify::new());
        let handle = ControlHandle {
            commands: command_tx,
            wake: Arc::clone(&wake),
            shutdown: Arc::new(shutdown_tx),
        };
        let control = Self {
            topology,
            settings,
            sensors,
            publisher,
            config,
            controller: FarmController::new(),
            commands: command_rx,
            wake,
            shutdown: shutdown_rx,
        };
        (control, handle)
    }

    /// Run a single tick at `now`.
    ///
    /// Pending commands stay queued when loading fails, so they apply on
    /// the next successful tick.
    ///
    /// # Errors
    ///
    /// Returns the storage error when topology or settings cannot be loaded.
    pub async fn run_once(&mut self, now: Timestamp) -> Result<Arc<TickOutcome>, PwmError> {
        let topology = self.topology.load_topology().await?;
        let settings = self.settings.load_settings().await?;
        let farm = resolver::resolve(&topology, &settings);

        let readings = self.read_levels(farm.level_sensors()).await;
        let farm = farm.with_readings(&readings);

        let mut commands = Vec::new();
        while let Ok(command) = self.commands.try_recv() {
            commands.push(command);
        }

        let outcome = Arc::new(self.controller.tick(&farm, commands, now));
        if let Err(err) = self.publisher.publish(Arc::clone(&outcome)).await {
            tracing::warn!(%err, "failed to publish tick outcome");
        }
        Ok(outcome)
    }

    /// Run until [`ControlHandle::shutdown`] is called or every handle is dropped.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            interval_ms = self.config.tick_interval.as_millis(),
            deadline_ms = self.config.sensor_deadline.as_millis(),
            "control loop started"
        );

        loop {
            if *self.shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
                () = self.wake.notified() => {
                    tracing::trace!("woken early");
                }
            }

            if let Err(err) = self.run_once(pwm_domain::time::now()).await {
                tracing::warn!(%err, "tick skipped");
            }
        }

        tracing::info!("control loop stopped");
    }

    async fn read_levels(&self, sensors: Vec<DeviceId>) -> LevelReadings {
        let mut readings = LevelReadings::new();
        if sensors.is_empty() {
            return readings;
        }

        let deadline = Instant::now() + self.config.sensor_deadline;
        let mut reads = JoinSet::new();
        for sensor in sensors {
            let reader = Arc::clone(&self.sensors);
            reads.spawn(async move {
                let value = reader.read_level(&sensor).await;
                (sensor, value)
            });
        }

        loop {
            match tokio::time::timeout_at(deadline, reads.join_next()).await {
                Ok(Some(Ok((sensor, Ok(Some(value)))))) => {
                    readings.insert(sensor, value);
                }
                Ok(Some(Ok((sensor, Ok(None))))) => {
                    tracing::debug!(%sensor, "sensor has no value");
                }
                Ok(Some(Ok((sensor, Err(err))))) => {
                    tracing::warn!(%sensor, %err, "sensor read failed");
                }
                Ok(Some(Err(err))) => {
                    tracing::warn!(%err, "sensor read task failed");
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(pending = reads.len(), "sensor deadline elapsed");
                    reads.abort_all();
                    break;
                }
            }
        }
        readings
    }
}
