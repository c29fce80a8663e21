//! Farm controller: one synchronous evaluation of the whole farm.
//!
//! [`FarmController`] owns the state that survives between ticks (stored
//! modes and bay memories). [`FarmController::tick`] takes a resolved
//! snapshot with readings attached plus the mode commands received since the
//! last tick, and produces a [`TickOutcome`]. Given the same state, snapshot,
//! commands and timestamp, it always produces the same outcome.

use std::collections::BTreeMap;

use serde::Serialize;

use pwm_domain::command::ModeCommand;
use pwm_domain::id::{BayId, PaddockId};
use pwm_domain::mode::AutomationMode;
use pwm_domain::report::{Report, Severity};
use pwm_domain::snapshot::ResolvedFarm;
use pwm_domain::time::Timestamp;

use crate::bay_machine::BayMemory;
use crate::conflict_guard::{self, EmittedCommand};
use crate::coordinator::{self, BayStatus, ModeBook, PaddockOutcome};

/// Result of one tick, handed to the actuation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickOutcome {
    pub at: Timestamp,
    /// Paddocks sorted by id.
    pub paddocks: Vec<PaddockOutcome>,
    /// Bays grouped by paddock, ascending order within each.
    pub bays: Vec<BayStatus>,
    /// One command per device, sorted by device id.
    pub commands: Vec<EmittedCommand>,
    pub reports: Vec<Report>,
}

impl TickOutcome {
    #[must_use]
    pub fn paddock(&self, id: &PaddockId) -> Option<&PaddockOutcome> {
        self.paddocks.iter().find(|p| &p.id == id)
    }

    #[must_use]
    pub fn bay(&self, id: &BayId) -> Option<&BayStatus> {
        self.bays.iter().find(|b| &b.id == id)
    }
}

/// Long-lived controller state.
#[derive(Debug, Default)]
pub struct FarmController {
    modes: ModeBook,
    memories: BTreeMap<BayId, BayMemory>,
}

impl FarmController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored mode of `paddock`.
    #[must_use]
    pub fn paddock_mode(&self, paddock: &PaddockId) -> AutomationMode {
        self.modes.paddock_mode(paddock)
    }

    /// Evaluate the farm once.
    ///
    /// Commands are applied first, in arrival order; each one that cannot be
    /// applied becomes a [`Report::CommandRejected`].
    #[tracing::instrument(skip_all, fields(paddocks = farm.paddocks.len(), commands = commands.len()))]
    pub fn tick(
        &mut self,
        farm: &ResolvedFarm,
        commands: Vec<ModeCommand>,
        now: Timestamp,
    ) -> TickOutcome {
        let mut reports = farm.reports.clone();

        for command in commands {
            if let Err(err) = self.modes.apply(farm, &command) {
                reports.push(Report::CommandRejected {
                    command: command.to_string(),
                    reason: err.to_string(),
                });
            }
        }

        let mut paddocks = Vec::with_capacity(farm.paddocks.len());
        let mut bays = Vec::new();
        let mut proposals = Vec::new();
        for paddock in &farm.paddocks {
            let tick =
                coordinator::coordinate_paddock(paddock, &mut self.modes, &mut self.memories, now);
            paddocks.push(tick.outcome);
            bays.extend(tick.bays);
            proposals.extend(tick.proposals);
            reports.extend(tick.reports);
        }

        let reconciled = conflict_guard::reconcile(proposals);
        reports.extend(reconciled.reports);

        self.modes.retain_known(farm);
        self.memories.retain(|id, _| farm.bay(id).is_some());

        for report in &reports {
            match report.severity() {
                Severity::Info => tracing::debug!(%report, "report"),
                Severity::Warning | Severity::Error => tracing::warn!(%report, "report"),
            }
        }
        tracing::debug!(
            commands = reconciled.commands.len(),
            reports = reports.len(),
            "tick evaluated"
        );

        TickOutcome {
            at: now,
            paddocks,
            bays,
            commands: reconciled.commands,
            reports,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use pwm_domain::id::{DeviceId, FarmId};
    use pwm_domain::mode::DoorState;
    use pwm_domain::settings::SettingsStore;
    use pwm_domain::slot::DeviceCommand;
    use pwm_domain::snapshot::LevelReadings;
    use pwm_domain::topology::{Farm, Topology};

    use crate::resolver::resolve;

    fn topology(paddocks: &[(&str, u32)]) -> Topology {
        let mut topology = Topology::default();
        topology.add_farm(Farm::new("home", "Home")).unwrap();
        for (name, bays) in paddocks {
            topology
                .add_paddock(&FarmId::new("home"), name, *bays, None)
                .unwrap();
        }
        topology
    }

    fn readings(values: &[(&str, f64)]) -> LevelReadings {
        values
            .iter()
            .map(|(sensor, value)| (DeviceId::new(*sensor), *value))
            .collect()
    }

    fn door_of(outcome: &TickOutcome, bay: &str) -> DoorState {
        outcome.bay(&BayId::new(bay)).unwrap().door
    }

    fn command_for(outcome: &TickOutcome, device: &str) -> Option<DeviceCommand> {
        outcome
            .commands
            .iter()
            .find(|c| c.device.as_str() == device)
            .map(|c| c.command)
    }

    #[test]
    fn should_cascade_flush_through_two_bays() {
        let topology = topology(&[("P", 2)]);
        let settings = SettingsStore::from_value(&serde_json::json!({
            "paddock_settings": {"p": {}},
            "bay_settings": {
                "p_b_01": {"level_sensor": "l1", "supply_1": "g1", "water_level_min": 5, "flush_time_on_water": 60},
                "p_b_02": {"level_sensor": "l2", "supply_1": "g2", "water_level_min": 5, "flush_time_on_water": 60}
            }
        }));
        let farm = resolve(&topology, &settings);
        let mut controller = FarmController::new();
        let t0 = pwm_domain::time::now();

        let at = |secs: i64| t0 + TimeDelta::seconds(secs);
        let with = |l1: f64, l2: f64| farm.clone().with_readings(&readings(&[("l1", l1), ("l2", l2)]));

        let first = controller.tick(
            &with(2.0, 0.0),
            vec![ModeCommand::paddock("p", AutomationMode::Flush)],
            at(0),
        );
        assert_eq!(door_of(&first, "p_b_01"), DoorState::Open);
        assert_eq!(door_of(&first, "p_b_02"), DoorState::Close);
        assert_eq!(command_for(&first, "g1"), Some(DeviceCommand::Open));
        assert_eq!(command_for(&first, "g2"), Some(DeviceCommand::Close));

        let holding = controller.tick(&with(6.0, 0.0), Vec::new(), at(10));
        assert_eq!(door_of(&holding, "p_b_01"), DoorState::HoldOne);
        assert_eq!(door_of(&holding, "p_b_02"), DoorState::Open);

        let still = controller.tick(&with(6.0, 3.0), Vec::new(), at(69));
        assert_eq!(door_of(&still, "p_b_01"), DoorState::HoldOne);
        assert_eq!(door_of(&still, "p_b_02"), DoorState::Open);

        let flushed = controller.tick(&with(6.0, 3.0), Vec::new(), at(70));
        assert_eq!(door_of(&flushed, "p_b_01"), DoorState::Close);
        assert!(flushed.bay(&BayId::new("p_b_01")).unwrap().flushed);
        assert_eq!(door_of(&flushed, "p_b_02"), DoorState::Open);

        let last = controller.tick(&with(6.0, 5.5), Vec::new(), at(80));
        assert_eq!(door_of(&last, "p_b_02"), DoorState::HoldOne);
        assert_eq!(command_for(&last, "g2"), Some(DeviceCommand::Close));
    }

    #[test]
    fn should_report_conflict_across_paddocks_sharing_a_device() {
        let topology = topology(&[("X", 1), ("Y", 1)]);
        let settings = SettingsStore::from_value(&serde_json::json!({
            "paddock_settings": {"x": {}, "y": {}},
            "bay_settings": {
                "x_b_01": {"level_sensor": "lx", "supply_1": "rb_040"},
                "y_b_01": {"level_sensor": "ly", "supply_1": "rb_040"}
            }
        }));
        let farm = resolve(&topology, &settings).with_readings(&readings(&[("lx", 1.0), ("ly", 10.0)]));
        let mut controller = FarmController::new();

        let outcome = controller.tick(
            &farm,
            vec![
                ModeCommand::paddock("x", AutomationMode::Flush),
                ModeCommand::paddock("y", AutomationMode::Pond),
            ],
            pwm_domain::time::now(),
        );

        assert_eq!(door_of(&outcome, "x_b_01"), DoorState::Open);
        assert_eq!(door_of(&outcome, "y_b_01"), DoorState::HoldTwo);
        assert_eq!(command_for(&outcome, "rb_040"), Some(DeviceCommand::Open));
        let conflicts: Vec<&Report> = outcome
            .reports
            .iter()
            .filter(|r| matches!(r, Report::DeviceConflict { .. }))
            .collect();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(
            conflicts[0].to_string(),
            "device rb_040: y_b_01 requested close but x_b_01 holds it open"
        );
    }

    #[test]
    fn should_not_let_idle_paddock_close_device_of_active_one() {
        let topology = topology(&[("A", 1), ("B", 1)]);
        let settings = SettingsStore::from_value(&serde_json::json!({
            "paddock_settings": {"a": {}, "b": {}},
            "bay_settings": {
                "a_b_01": {"level_sensor": "la", "supply_1": "channel_1"},
                "b_b_01": {"level_sensor": "lb", "supply_1": "channel_1"}
            }
        }));
        let farm = resolve(&topology, &settings).with_readings(&readings(&[("la", 0.0), ("lb", 0.0)]));
        let mut controller = FarmController::new();

        let outcome = controller.tick(
            &farm,
            vec![ModeCommand::paddock("b", AutomationMode::Pond)],
            pwm_domain::time::now(),
        );

        assert_eq!(door_of(&outcome, "b_b_01"), DoorState::Open);
        let emitted = outcome
            .commands
            .iter()
            .find(|c| c.device.as_str() == "channel_1")
            .unwrap();
        assert_eq!(emitted.command, DeviceCommand::Open);
        assert_eq!(emitted.bay, BayId::new("b_b_01"));
        assert!(outcome.reports.iter().any(|r| matches!(
            r,
            Report::DeviceConflict { winner, loser, .. }
                if *winner == BayId::new("b_b_01") && *loser == BayId::new("a_b_01")
        )));
    }

    #[test]
    fn should_close_and_report_pond_bay_without_reading() {
        let topology = topology(&[("P", 1)]);
        let settings = SettingsStore::from_value(&serde_json::json!({
            "paddock_settings": {"p": {}},
            "bay_settings": {"p_b_01": {"level_sensor": "l1", "supply_1": "g1"}}
        }));
        let farm = resolve(&topology, &settings).with_readings(&LevelReadings::new());
        let mut controller = FarmController::new();

        let outcome = controller.tick(
            &farm,
            vec![ModeCommand::paddock("p", AutomationMode::Pond)],
            pwm_domain::time::now(),
        );

        assert_eq!(door_of(&outcome, "p_b_01"), DoorState::Close);
        assert_eq!(command_for(&outcome, "g1"), Some(DeviceCommand::Close));
        assert!(outcome.reports.contains(&Report::SensorUnavailable {
            bay: BayId::new("p_b_01"),
            sensor: Some(DeviceId::new("l1")),
        }));
    }

    #[test]
    fn should_turn_rejected_command_into_report() {
        let farm = resolve(&topology(&[("P", 1)]), &SettingsStore::default());
        let mut controller = FarmController::new();

        let outcome = controller.tick(
            &farm,
            vec![ModeCommand::bay("p_b_01", AutomationMode::Pond)],
            pwm_domain::time::now(),
        );

        assert!(outcome.reports.iter().any(|r| matches!(
            r,
            Report::CommandRejected { command, .. } if command == "bay p_b_01 Pond"
        )));
        assert_eq!(controller.paddock_mode(&PaddockId::new("p")), AutomationMode::Off);
    }

    #[test]
    fn should_keep_other_paddocks_running_when_one_topology_is_invalid() {
        let mut topology = topology(&[("Bad", 2), ("Good", 1)]);
        topology.bays.retain(|b| b.id != BayId::new("bad_b_02"));
        let settings = SettingsStore::from_value(&serde_json::json!({
            "paddock_settings": {"bad": {}, "good": {}},
            "bay_settings": {"good_b_01": {"level_sensor": "l1"}}
        }));
        let farm = resolve(&topology, &settings).with_readings(&readings(&[("l1", 1.0)]));
        let mut controller = FarmController::new();

        let outcome = controller.tick(
            &farm,
            vec![
                ModeCommand::paddock("bad", AutomationMode::Pond),
                ModeCommand::paddock("good", AutomationMode::Pond),
            ],
            pwm_domain::time::now(),
        );

        assert!(outcome.paddock(&PaddockId::new("bad")).unwrap().excluded);
        assert!(outcome.bay(&BayId::new("bad_b_01")).is_none());
        assert_eq!(door_of(&outcome, "good_b_01"), DoorState::Open);
        assert!(outcome.reports.iter().any(|r| r.severity() == Severity::Error));
    }

    #[test]
    fn should_produce_identical_outcomes_for_identical_inputs() {
        let topology = topology(&[("A", 3), ("B", 2)]);
        let settings = SettingsStore::from_value(&serde_json::json!({
            "bay_settings": {
                "a_b_01": {"level_sensor": "s1", "supply_1": "g1", "drain_1": "g2"},
                "a_b_02": {"level_sensor": "s2", "supply_1": "g2"},
                "b_b_01": {"level_sensor": "s3", "supply_1": "g1"}
            }
        }));
        let farm =
            resolve(&topology, &settings).with_readings(&readings(&[("s1", 7.0), ("s2", 1.0), ("s3", 2.0)]));
        let commands = vec![
            ModeCommand::paddock("a", AutomationMode::Flush),
            ModeCommand::paddock("b", AutomationMode::Pond),
        ];
        let now = pwm_domain::time::now();

        let left = FarmController::new().tick(&farm, commands.clone(), now);
        let right = FarmController::new().tick(&farm, commands, now);

        assert_eq!(left, right);
    }

    #[test]
    fn should_forget_state_of_removed_paddocks() {
        let mut topology = topology(&[("A", 1), ("B", 1)]);
        let mut controller = FarmController::new();
        let farm = resolve(&topology, &SettingsStore::default());
        controller.tick(
            &farm,
            vec![ModeCommand::paddock("b", AutomationMode::Drain)],
            pwm_domain::time::now(),
        );
        assert_eq!(controller.paddock_mode(&PaddockId::new("b")), AutomationMode::Drain);

        topology.remove_paddock(&PaddockId::new("b")).unwrap();
        let farm = resolve(&topology, &SettingsStore::default());
        controller.tick(&farm, Vec::new(), pwm_domain::time::now());

        assert_eq!(controller.paddock_mode(&PaddockId::new("b")), AutomationMode::Off);
        assert!(controller.memories.keys().all(|id| id.as_str() == "a_b_01"));
    }
}
