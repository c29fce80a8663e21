//! Virtual level sensors: raw readings held in memory.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use pwm_app::ports::LevelSensorReader;
use pwm_domain::error::PwmError;
use pwm_domain::id::DeviceId;

/// A bank of simulated water-level sensors.
///
/// Unknown sensors read as "no value", the same way an unavailable platform
/// sensor does.
#[derive(Debug, Default)]
pub struct VirtualLevelSensors {
    levels: Mutex<BTreeMap<DeviceId, f64>>,
}

impl VirtualLevelSensors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given raw readings.
    #[must_use]
    pub fn with_levels(levels: impl IntoIterator<Item = (DeviceId, f64)>) -> Self {
        Self {
            levels: Mutex::new(levels.into_iter().collect()),
        }
    }

    /// Overwrite the raw reading of `sensor`.
    pub fn set_level(&self, sensor: DeviceId, value: f64) {
        self.lock().insert(sensor, value);
    }

    /// Make `sensor` unreadable.
    pub fn clear(&self, sensor: &DeviceId) {
        self.lock().remove(sensor);
    }

    #[must_use]
    pub fn level(&self, sensor: &DeviceId) -> Option<f64> {
        self.lock().get(sensor).copied()
    }

    /// Shift the reading of `sensor` by `delta`, never below zero.
    ///
    /// Returns the new value, or `None` if the sensor has no reading.
    pub fn adjust(&self, sensor: &DeviceId, delta: f64) -> Option<f64> {
        let mut levels = self.lock();
        let value = levels.get_mut(sensor)?;
        *value = (*value + delta).max(0.0);
        Some(*value)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<DeviceId, f64>> {
        // the map stays consistent even if a holder panicked
        self.levels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LevelSensorReader for VirtualLevelSensors {
    fn read_level(
        &self,
        sensor: &DeviceId,
    ) -> impl Future<Output = Result<Option<f64>, PwmError>> + Send {
        let value = self.level(sensor);
        async move { Ok(value) }
    }
}
