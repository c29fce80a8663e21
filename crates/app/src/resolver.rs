//! Config resolver: merges topology and settings into the per-tick snapshot.
//!
//! This is the only place that knows about the two settings layouts. For
//! every field the current layout (`paddock_settings` / `bay_settings`) wins,
//! then the legacy inline blocks (`paddocks` / `bays[..].settings`), then the
//! hard defaults. Resolution never fails: missing or unreadable settings are
//! replaced by defaults and reported as [`Report::ConfigIncomplete`].

use pwm_domain::report::Report;
use pwm_domain::settings::{
    BaySettingsRecord, DEFAULT_AUTOMATION_STATE_INDIVIDUAL, DEFAULT_ENABLED,
    DEFAULT_FLUSH_TIME_ON_WATER, PaddockSettingsRecord, SettingsStore,
};
use pwm_domain::slot::{DeviceSlot, SlotMap};
use pwm_domain::snapshot::{ResolvedBay, ResolvedFarm, ResolvedPaddock, WaterLevels};
use pwm_domain::topology::{Bay, Paddock, Topology};

/// Build the resolved snapshot of the whole farm (without sensor readings).
///
/// Paddocks come out sorted by id and bays sorted by `order`. Attach the
/// tick's readings with [`ResolvedFarm::with_readings`].
#[must_use]
pub fn resolve(topology: &Topology, settings: &SettingsStore) -> ResolvedFarm {
    let mut reports: Vec<Report> = settings
        .rejected
        .iter()
        .map(|entry| {
            tracing::debug!(
                section = entry.section,
                key = %entry.key,
                reason = %entry.reason,
                "settings entry rejected"
            );
            Report::ConfigIncomplete {
                subject: format!("{}.{}", entry.section, entry.key),
                detail: format!("unreadable entry ignored: {}", entry.reason),
            }
        })
        .collect();

    let mut paddocks: Vec<&Paddock> = topology.paddocks.iter().collect();
    paddocks.sort_by(|a, b| a.id.cmp(&b.id));

    let resolved = paddocks
        .into_iter()
        .map(|paddock| resolve_paddock(topology, paddock, settings, &mut reports))
        .collect();

    for orphan in topology
        .bays
        .iter()
        .filter(|bay| topology.paddock(&bay.paddock_id).is_none())
    {
        tracing::debug!(bay = %orphan.id, paddock = %orphan.paddock_id, "bay without paddock ignored");
    }

    ResolvedFarm {
        paddocks: resolved,
        reports,
    }
}

fn resolve_paddock(
    topology: &Topology,
    paddock: &Paddock,
    settings: &SettingsStore,
    reports: &mut Vec<Report>,
) -> ResolvedPaddock {
    let current = settings.paddock_settings.get(&paddock.id);
    let legacy = settings.paddocks.get(&paddock.id);
    if current.is_none() && legacy.is_none() {
        reports.push(Report::ConfigIncomplete {
            subject: paddock.id.to_string(),
            detail: "no paddock settings, using defaults".to_string(),
        });
    }
    let record = current
        .cloned()
        .unwrap_or_default()
        .or(legacy.unwrap_or(&PaddockSettingsRecord::default()));

    let topology_check = topology.validate_paddock(&paddock.id);
    let bays = topology
        .chain(&paddock.id)
        .into_iter()
        .map(|bay| resolve_bay(bay, settings, reports))
        .collect();

    ResolvedPaddock {
        id: paddock.id.clone(),
        name: paddock.name.clone(),
        farm_id: paddock.farm_id.clone(),
        enabled: record.enabled.unwrap_or(DEFAULT_ENABLED),
        automation_state_individual: record
            .automation_state_individual
            .unwrap_or(DEFAULT_AUTOMATION_STATE_INDIVIDUAL),
        bays,
        topology: topology_check,
    }
}

fn resolve_bay(bay: &Bay, settings: &SettingsStore, reports: &mut Vec<Report>) -> ResolvedBay {
    let current = settings.bay_settings.get(&bay.id);
    let legacy = settings.bays.get(&bay.id).map(|block| &block.settings);
    if current.is_none() && legacy.is_none() {
        reports.push(Report::ConfigIncomplete {
            subject: bay.id.to_string(),
            detail: "no bay settings, using defaults".to_string(),
        });
    }
    let record = current
        .cloned()
        .unwrap_or_default()
        .or(legacy.unwrap_or(&BaySettingsRecord::default()));

    let slots: SlotMap = DeviceSlot::ALL
        .into_iter()
        .filter_map(|slot| record.slot(slot).map(|device| (slot, device.clone())))
        .collect();

    let defaults = WaterLevels::default();
    let mut levels = WaterLevels {
        min: record.water_level_min.unwrap_or(defaults.min),
        max: record.water_level_max.unwrap_or(defaults.max),
        offset: record.water_level_offset.unwrap_or(defaults.offset),
    };
    if levels.min > levels.max {
        reports.push(Report::ConfigIncomplete {
            subject: bay.id.to_string(),
            detail: format!(
                "water_level_min {} exceeds water_level_max {}, using defaults",
                levels.min, levels.max
            ),
        });
        levels.min = defaults.min;
        levels.max = defaults.max;
    }

    tracing::trace!(
        bay = %bay.id,
        order = bay.order,
        min = levels.min,
        max = levels.max,
        sensor = ?record.level_sensor,
        "bay resolved"
    );

    ResolvedBay {
        id: bay.id.clone(),
        paddock_id: bay.paddock_id.clone(),
        name: bay.name.clone(),
        order: bay.order,
        is_last_bay: bay.is_last_bay,
        slots,
        level_sensor: record.level_sensor.clone(),
        levels,
        flush_time_on_water: record
            .flush_time_on_water
            .unwrap_or(DEFAULT_FLUSH_TIME_ON_WATER),
        level: None,
    }
}
