//! Store ports: read-only access to the topology and settings registries.

use std::future::Future;

use pwm_domain::error::PwmError;
use pwm_domain::settings::SettingsStore;
use pwm_domain::topology::Topology;

/// Supplies the farm structure once per tick.
pub trait TopologySource {
    /// Load the current topology snapshot.
    fn load_topology(&self) -> impl Future<Output = Result<Topology, PwmError>> + Send;
}

/// Supplies the settings store once per tick.
pub trait SettingsSource {
    /// Load the current settings snapshot.
    ///
    /// Implementations should parse entry by entry (see
    /// [`SettingsStore::from_value`]) so one bad record does not fail the load.
    fn load_settings(&self) -> impl Future<Output = Result<SettingsStore, PwmError>> + Send;
}

impl<T: TopologySource + Send + Sync> TopologySource for std::sync::Arc<T> {
    fn load_topology(&self) -> impl Future<Output = Result<Topology, PwmError>> + Send {
        (**self).load_topology()
    }
}

impl<T: SettingsSource + Send + Sync> SettingsSource for std::sync::Arc<T> {
    fn load_settings(&self) -> impl Future<Output = Result<SettingsStore, PwmError>> + Send {
        (**self).load_settings()
    }
}
