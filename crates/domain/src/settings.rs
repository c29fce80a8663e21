//! Settings store records: per-paddock flags and per-bay wiring and thresholds.
//!
//! Settings exist in two layouts. Current records live under
//! `paddock_settings` / `bay_settings`; older stores kept the same values
//! inline under `paddocks` / `bays` (bay values nested in a `settings`
//! object). Every field is optional here: filling gaps and choosing between
//! layouts is the resolver's job.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::id::{BayId, DeviceId, PaddockId};
use crate::slot::DeviceSlot;

pub const DEFAULT_ENABLED: bool = true;
pub const DEFAULT_AUTOMATION_STATE_INDIVIDUAL: bool = false;
pub const DEFAULT_WATER_LEVEL_MIN: f64 = 5.0;
pub const DEFAULT_WATER_LEVEL_MAX: f64 = 15.0;
pub const DEFAULT_WATER_LEVEL_OFFSET: f64 = 0.0;
pub const DEFAULT_FLUSH_TIME_ON_WATER: u32 = 3600;

/// Paddock-level flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddockSettingsRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automation_state_individual: Option<bool>,
}

/// Bay wiring and water-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaySettingsRecord {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "device_ref")]
    pub supply_1: Option<DeviceId>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "device_ref")]
    pub supply_2: Option<DeviceId>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "device_ref")]
    pub drain_1: Option<DeviceId>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "device_ref")]
    pub drain_2: Option<DeviceId>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "device_ref")]
    pub level_sensor: Option<DeviceId>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "number")]
    pub water_level_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "number")]
    pub water_level_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "number")]
    pub water_level_offset: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "seconds")]
    pub flush_time_on_water: Option<u32>,
}

impl BaySettingsRecord {
    /// Device assigned to `slot`, if any.
    #[must_use]
    pub fn slot(&self, slot: DeviceSlot) -> Option<&DeviceId> {
        match slot {
            DeviceSlot::Supply1 => self.supply_1.as_ref(),
            DeviceSlot::Supply2 => self.supply_2.as_ref(),
            DeviceSlot::Drain1 => self.drain_1.as_ref(),
            DeviceSlot::Drain2 => self.drain_2.as_ref(),
        }
    }

    /// Fill every field that is unset here from `fallback`.
    #[must_use]
    pub fn or(self, fallback: &Self) -> Self {
        Self {
            supply_1: self.supply_1.or_else(|| fallback.supply_1.clone()),
            supply_2: self.supply_2.or_else(|| fallback.supply_2.clone()),
            drain_1: self.drain_1.or_else(|| fallback.drain_1.clone()),
            drain_2: self.drain_2.or_else(|| fallback.drain_2.clone()),
            level_sensor: self.level_sensor.or_else(|| fallback.level_sensor.clone()),
            water_level_min: self.water_level_min.or(fallback.water_level_min),
            water_level_max: self.water_level_max.or(fallback.water_level_max),
            water_level_offset: self.water_level_offset.or(fallback.water_level_offset),
            flush_time_on_water: self.flush_time_on_water.or(fallback.flush_time_on_water),
        }
    }
}

impl PaddockSettingsRecord {
    /// Fill every field that is unset here from `fallback`.
    #[must_use]
    pub fn or(self, fallback: &Self) -> Self {
        Self {
            enabled: self.enabled.or(fallback.enabled),
            automation_state_individual: self
                .automation_state_individual
                .or(fallback.automation_state_individual),
        }
    }
}

/// Legacy inline bay block: `{"settings": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyBayRecord {
    pub settings: BaySettingsRecord,
}

/// An entry that could not be parsed and is treated as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    /// Top-level section the entry was found in (`bay_settings`, `paddocks`, …).
    pub section: &'static str,
    pub key: String,
    pub reason: String,
}

/// Snapshot of the settings store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsStore {
    pub paddock_settings: BTreeMap<PaddockId, PaddockSettingsRecord>,
    pub bay_settings: BTreeMap<BayId, BaySettingsRecord>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub paddocks: BTreeMap<PaddockId, PaddockSettingsRecord>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub bays: BTreeMap<BayId, LegacyBayRecord>,
    #[serde(skip)]
    pub rejected: Vec<RejectedEntry>,
}

impl SettingsStore {
    /// Parse a settings document entry by entry.
    ///
    /// A malformed entry is skipped and recorded in [`rejected`](Self::rejected)
    /// so the rest of the farm still gets its settings. Sections that are not
    /// objects are rejected as a whole.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Self {
        let mut store = Self::default();
        let mut rejected = Vec::new();
        store.paddock_settings = parse_section(value, "paddock_settings", &mut rejected);
        store.bay_settings = parse_section(value, "bay_settings", &mut rejected);
        store.paddocks = parse_section(value, "paddocks", &mut rejected);
        store.bays = parse_section(value, "bays", &mut rejected);
        store.rejected = rejected;
        store
    }

    /// Record the enabled flag of a paddock under the current layout.
    pub fn set_paddock_enabled(&mut self, paddock: &PaddockId, enabled: bool) {
        self.paddock_settings
            .entry(paddock.clone())
            .or_default()
            .enabled = Some(enabled);
    }

    /// Record the individual-mode flag of a paddock under the current layout.
    pub fn set_automation_state_individual(&mut self, paddock: &PaddockId, individual: bool) {
        self.paddock_settings
            .entry(paddock.clone())
            .or_default()
            .automation_state_individual = Some(individual);
    }

    /// Replace the settings of one bay under the current layout.
    pub fn set_bay_settings(&mut self, bay: &BayId, settings: BaySettingsRecord) {
        self.bay_settings.insert(bay.clone(), settings);
    }

    /// Drop the settings of a paddock and of the given bays from both layouts.
    pub fn remove_paddock(&mut self, paddock: &PaddockId, bays: &[BayId]) {
        self.paddock_settings.remove(paddock);
        self.paddocks.remove(paddock);
        for bay in bays {
            self.bay_settings.remove(bay);
            self.bays.remove(bay);
        }
    }

    /// Fold the legacy inline blocks into the current layout.
    ///
    /// Values already present under the current keys win field by field.
    pub fn migrate_legacy(&mut self) {
        for (id, legacy) in std::mem::take(&mut self.paddocks) {
            let current = self.paddock_settings.remove(&id).unwrap_or_default();
            self.paddock_settings.insert(id, current.or(&legacy));
        }
        for (id, legacy) in std::mem::take(&mut self.bays) {
            let current = self.bay_settings.remove(&id).unwrap_or_default();
            self.bay_settings.insert(id, current.or(&legacy.settings));
        }
    }
}

fn parse_section<K, V>(
    root: &serde_json::Value,
    section: &'static str,
    rejected: &mut Vec<RejectedEntry>,
) -> BTreeMap<K, V>
where
    K: From<String> + Ord,
    V: serde::de::DeserializeOwned,
{
    let mut out = BTreeMap::new();
    let Some(raw) = root.get(section) else {
        return out;
    };
    let Some(entries) = raw.as_object() else {
        if !raw.is_null() {
            rejected.push(RejectedEntry {
                section,
                key: String::new(),
                reason: "section is not an object".to_string(),
            });
        }
        return out;
    };
    for (key, entry) in entries {
        match V::deserialize(entry) {
            Ok(value) => {
                out.insert(K::from(key.clone()), value);
            }
            Err(err) => rejected.push(RejectedEntry {
                section,
                key: key.clone(),
                reason: err.to_string(),
            }),
        }
    }
    out
}

/// Device references: blank strings and `"none"` mean "unassigned".
fn device_ref<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DeviceId>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(DeviceId::new(value))
        }
    }))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Numbers may be stored as JSON numbers or numeric strings (`"5.5"`).
/// `NaN` and infinities are refused.
fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = match Option::<NumberOrText>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(NumberOrText::Number(value)) => value,
        Some(NumberOrText::Text(text)) if text.trim().is_empty() => return Ok(None),
        Some(NumberOrText::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("not a number: {text:?}")))?,
    };
    if !value.is_finite() {
        return Err(serde::de::Error::custom(format!(
            "not a finite number: {value}"
        )));
    }
    Ok(Some(value))
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let Some(value) = number(deserializer)? else {
        return Ok(None);
    };
    if !value.is_finite() || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(serde::de::Error::custom(format!(
            "not a duration in seconds: {value}"
        )));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let secs = value.round() as u32;
    Ok(Some(secs))
}
