//! Virtual hydraulics: moves simulated water levels in response to doors.
//!
//! Every published tick outcome is treated as one time step: an open bay in
//! a filling mode gains `fill_step`, an open bay in `Drain` loses
//! `drain_step`, and a closed or holding bay keeps its level.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::broadcast;

use pwm_app::controller::TickOutcome;
use pwm_domain::mode::{AutomationMode, DoorState};

use crate::sensor::VirtualLevelSensors;

/// Level change per tick.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct HydraulicsConfig {
    pub fill_step: f64,
    pub drain_step: f64,
}

impl Default for HydraulicsConfig {
    fn default() -> Self {
        Self {
            fill_step: 1.5,
            drain_step: 2.0,
        }
    }
}

/// Applies tick outcomes to a [`VirtualLevelSensors`] bank.
pub struct VirtualHydraulics {
    sensors: Arc<VirtualLevelSensors>,
    config: HydraulicsConfig,
}

impl VirtualHydraulics {
    #[must_use]
    pub fn new(sensors: Arc<VirtualLevelSensors>, config: HydraulicsConfig) -> Self {
        Self { sensors, config }
    }

    /// Advance the simulation by one step.
    pub fn apply(&self, outcome: &TickOutcome) {
        for bay in &outcome.bays {
            let Some(sensor) = &bay.level_sensor else {
                continue;
            };
            let delta = match (bay.mode, bay.door) {
                (AutomationMode::Flush | AutomationMode::Pond, DoorState::Open) => {
                    self.config.fill_step
                }
                (AutomationMode::Drain, DoorState::Open) => -self.config.drain_step,
                _ => continue,
            };
            if let Some(level) = self.sensors.adjust(sensor, delta) {
                tracing::trace!(bay = %bay.id, %sensor, level, "simulated level");
            }
        }
    }

    /// Follow `outcomes` until the bus closes.
    pub async fn run(self, mut outcomes: broadcast::Receiver<Arc<TickOutcome>>) {
        loop {
            match outcomes.recv().await {
                Ok(outcome) => self.apply(&outcome),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "hydraulics fell behind, outcomes skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("hydraulics stopped");
    }
}
