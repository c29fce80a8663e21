//! Sensor port: live water-level readings.

use std::future::Future;

use pwm_domain::error::PwmError;
use pwm_domain::id::DeviceId;

/// Reads the raw value of a level sensor.
pub trait LevelSensorReader {
    /// Read `sensor`.
    ///
    /// `Ok(None)` means the platform knows the sensor but has no usable
    /// value (unknown / unavailable). Either way the bay is treated as
    /// having no reading for this tick.
    fn read_level(
        &self,
        sensor: &DeviceId,
    ) -> impl Future<Output = Result<Option<f64>, PwmError>> + Send;
}

impl<T: LevelSensorReader + Send + Sync> LevelSensorReader for std::sync::Arc<T> {
    fn read_level(
        &self,
        sensor: &DeviceId,
    ) -> impl Future<Output = Result<Option<f64>, PwmError>> + Send {
        (**self).read_level(sensor)
    }
}
