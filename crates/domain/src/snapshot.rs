//! Resolved snapshots: the immutable per-tick view the control core works on.

use std::collections::BTreeMap;

use chrono::TimeDelta;
use serde::Serialize;

use crate::id::{BayId, DeviceId, FarmId, PaddockId};
use crate::report::Report;
use crate::settings::{
    DEFAULT_FLUSH_TIME_ON_WATER, DEFAULT_WATER_LEVEL_MAX, DEFAULT_WATER_LEVEL_MIN,
    DEFAULT_WATER_LEVEL_OFFSET,
};
use crate::slot::SlotMap;
use crate::topology::TopologyError;

/// Raw level readings keyed by sensor device, as delivered by the platform.
pub type LevelReadings = BTreeMap<DeviceId, f64>;

/// Water-level thresholds of a bay, in calibrated sensor units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WaterLevels {
    pub min: f64,
    pub max: f64,
    pub offset: f64,
}

impl Default for WaterLevels {
    fn default() -> Self {
        Self {
            min: DEFAULT_WATER_LEVEL_MIN,
            max: DEFAULT_WATER_LEVEL_MAX,
            offset: DEFAULT_WATER_LEVEL_OFFSET,
        }
    }
}

impl WaterLevels {
    /// Apply the calibration offset to a raw reading.
    #[must_use]
    pub fn calibrate(&self, raw: f64) -> f64 {
        raw + self.offset
    }
}

/// One bay: structure, settings and its calibrated level for this tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedBay {
    pub id: BayId,
    pub paddock_id: PaddockId,
    pub name: String,
    pub order: u32,
    pub is_last_bay: bool,
    pub slots: SlotMap,
    pub level_sensor: Option<DeviceId>,
    pub levels: WaterLevels,
    /// Seconds the bay must hold water before a flush moves on.
    pub flush_time_on_water: u32,
    /// Calibrated level, `None` when there is no sensor or no reading.
    pub level: Option<f64>,
}

impl ResolvedBay {
    #[must_use]
    pub fn is_first(&self) -> bool {
        self.order == 1
    }

    #[must_use]
    pub fn has_drain(&self) -> bool {
        self.slots.keys().any(|slot| slot.is_drain())
    }

    #[must_use]
    pub fn flush_duration(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.flush_time_on_water))
    }

    /// A bay with default settings, no devices and no reading.
    #[must_use]
    pub fn bare(paddock_id: &PaddockId, order: u32, is_last_bay: bool) -> Self {
        Self {
            id: BayId::for_order(paddock_id, order),
            paddock_id: paddock_id.clone(),
            name: format!("{}{order:02}", crate::topology::DEFAULT_BAY_PREFIX),
            order,
            is_last_bay,
            slots: SlotMap::new(),
            level_sensor: None,
            levels: WaterLevels::default(),
            flush_time_on_water: DEFAULT_FLUSH_TIME_ON_WATER,
            level: None,
        }
    }
}

/// One paddock with its flags and its bays sorted by `order`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPaddock {
    pub id: PaddockId,
    pub name: String,
    pub farm_id: FarmId,
    pub enabled: bool,
    pub automation_state_individual: bool,
    pub bays: Vec<ResolvedBay>,
    /// Outcome of the chain check; an invalid paddock is excluded from the tick.
    pub topology: Result<(), TopologyError>,
}

/// The whole farm for one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedFarm {
    /// Paddocks sorted by id.
    pub paddocks: Vec<ResolvedPaddock>,
    /// Conditions found while resolving (missing or unreadable settings).
    pub reports: Vec<Report>,
}

impl ResolvedFarm {
    #[must_use]
    pub fn paddock(&self, id: &PaddockId) -> Option<&ResolvedPaddock> {
        self.paddocks.iter().find(|p| &p.id == id)
    }

    #[must_use]
    pub fn bay(&self, id: &BayId) -> Option<&ResolvedBay> {
        self.paddocks
            .iter()
            .flat_map(|p| p.bays.iter())
            .find(|b| &b.id == id)
    }

    /// Attach this tick's readings, calibrated per bay.
    ///
    /// Bays whose sensor has no finite reading keep `level = None`.
    #[must_use]
    pub fn with_readings(mut self, readings: &LevelReadings) -> Self {
        for bay in self.paddocks.iter_mut().flat_map(|p| p.bays.iter_mut()) {
            bay.level = bay
                .level_sensor
                .as_ref()
                .and_then(|sensor| readings.get(sensor))
                .filter(|raw| raw.is_finite())
                .map(|raw| bay.levels.calibrate(*raw));
        }
        self
    }

    /// Every level sensor referenced by a bay, deduplicated and sorted.
    #[must_use]
    pub fn level_sensors(&self) -> Vec<DeviceId> {
        let mut sensors: Vec<DeviceId> = self
            .paddocks
            .iter()
            .flat_map(|p| p.bays.iter())
            .filter_map(|b| b.level_sensor.clone())
            .collect();
        sensors.sort();
        sensors.dedup();
        sensors
    }
}
