//! Bay state machine: door control for a single bay.
//!
//! [`evaluate`] is a pure function of the resolved bay, its effective mode,
//! the memory it carried out of the previous tick, the outcome of the
//! upstream bay in the *current* tick, and the tick timestamp. Rules are
//! checked top to bottom and the first match wins:
//!
//! 1. `Off` closes the bay.
//! 2. `Drain` opens the bay if it has a drain slot, otherwise closes it.
//! 3. A filling mode without a level reading closes the bay and reports the sensor.
//! 4. A filling mode on a bay the cascade has not reached yet closes the bay.
//! 5. `Flush` fills to `min`, holds for `flush_time_on_water`, then completes.
//! 6. `Pond` fills below `min`, holds inside `[min, max]`, closes above `max`.

use serde::Serialize;

use pwm_domain::mode::{AutomationMode, DoorState};
use pwm_domain::report::Report;
use pwm_domain::snapshot::ResolvedBay;
use pwm_domain::time::{Timestamp, has_elapsed};

/// State a bay carries from one tick to the next.
///
/// Memory belongs to one mode: when the effective mode differs from
/// [`BayMemory::mode`] the memory is discarded and the cascade starts over.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BayMemory {
    pub mode: AutomationMode,
    /// The cascade arrived at this bay during the current mode.
    pub reached: bool,
    /// When the level first reached `min` in the current hold.
    pub water_since: Option<Timestamp>,
    pub flush_complete: bool,
    /// Door state decided on the last tick.
    pub door: DoorState,
}

impl BayMemory {
    /// Fresh memory for a bay entering `mode`.
    #[must_use]
    pub fn entering(mode: AutomationMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

/// What a bay decided this tick, as seen by the next bay in the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BayOutcome {
    pub door: DoorState,
    /// The bay finished its flush and closed behind the water.
    pub flushed: bool,
}

impl BayOutcome {
    /// Whether the bay downstream of this one counts as reached.
    #[must_use]
    pub fn releases_downstream(&self) -> bool {
        self.door.is_holding() || (self.door == DoorState::Close && self.flushed)
    }
}

/// Result of evaluating one bay for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct BayDecision {
    pub outcome: BayOutcome,
    /// Memory to carry into the next tick.
    pub memory: BayMemory,
    pub report: Option<Report>,
}

/// Decide the door state of `bay` for this tick.
#[must_use]
pub fn evaluate(
    bay: &ResolvedBay,
    mode: AutomationMode,
    memory: &BayMemory,
    upstream: Option<&BayOutcome>,
    now: Timestamp,
) -> BayDecision {
    let mut next = if memory.mode == mode {
        memory.clone()
    } else {
        BayMemory::entering(mode)
    };

    let (outcome, report) = match mode {
        AutomationMode::Off => (door(DoorState::Close), None),
        AutomationMode::Drain => {
            let state = if bay.has_drain() {
                DoorState::Open
            } else {
                DoorState::Close
            };
            (door(state), None)
        }
        AutomationMode::Flush | AutomationMode::Pond => {
            next.reached = next.reached
                || bay.is_first()
                || upstream.is_some_and(BayOutcome::releases_downstream);
            match bay.level {
                None => (
                    door(DoorState::Close),
                    Some(Report::SensorUnavailable {
                        bay: bay.id.clone(),
                        sensor: bay.level_sensor.clone(),
                    }),
                ),
                Some(_) if !next.reached => (door(DoorState::Close), None),
                Some(level) if mode == AutomationMode::Flush => {
                    (flush(bay, level, &mut next, now), None)
                }
                Some(level) => (door(pond(bay, level)), None),
            }
        }
    };

    next.door = outcome.door;
    BayDecision {
        outcome,
        memory: next,
        report,
    }
}

fn door(state: DoorState) -> BayOutcome {
    BayOutcome {
        door: state,
        flushed: false,
    }
}

fn after_flush(bay: &ResolvedBay) -> BayOutcome {
    BayOutcome {
        door: if bay.is_last_bay {
            DoorState::HoldOne
        } else {
            DoorState::Close
        },
        flushed: true,
    }
}

fn flush(bay: &ResolvedBay, level: f64, memory: &mut BayMemory, now: Timestamp) -> BayOutcome {
    if memory.flush_complete {
        return after_flush(bay);
    }
    if level < bay.levels.min {
        memory.water_since = None;
        return door(DoorState::Open);
    }
    let since = *memory.water_since.get_or_insert(now);
    if has_elapsed(since, now, bay.flush_duration()) {
        tracing::debug!(bay = %bay.id, "flush complete");
        memory.flush_complete = true;
        return after_flush(bay);
    }
    door(DoorState::HoldOne)
}

fn pond(bay: &ResolvedBay, level: f64) -> DoorState {
    if level < bay.levels.min {
        DoorState::Open
    } else if level > bay.levels.max {
        DoorState::Close
    } else {
        DoorState::HoldTwo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use pwm_domain::id::{DeviceId, PaddockId};
    use pwm_domain::slot::DeviceSlot;

    fn bay(order: u32, is_last: bool, level: Option<f64>) -> ResolvedBay {
        let mut bay = ResolvedBay::bare(&PaddockId::new("north"), order, is_last);
        bay.level_sensor = Some(DeviceId::new(format!("level_{order}")));
        bay.level = level;
        bay.flush_time_on_water = 60;
        bay
    }

    fn start() -> Timestamp {
        pwm_domain::time::now()
    }

    fn holding() -> BayOutcome {
        door(DoorState::HoldOne)
    }

    #[test]
    fn should_close_when_mode_is_off_whatever_the_level() {
        for level in [None, Some(0.0), Some(10.0), Some(100.0)] {
            let decision = evaluate(
                &bay(1, false, level),
                AutomationMode::Off,
                &BayMemory::default(),
                None,
                start(),
            );
            assert_eq!(decision.outcome.door, DoorState::Close);
            assert!(decision.report.is_none());
        }
    }

    #[test]
    fn should_open_drain_when_bay_has_drain_slot() {
        let mut with_drain = bay(2, false, None);
        with_drain
            .slots
            .insert(DeviceSlot::Drain1, DeviceId::new("rb_drain"));

        let open = evaluate(
            &with_drain,
            AutomationMode::Drain,
            &BayMemory::default(),
            None,
            start(),
        );
        let closed = evaluate(
            &bay(2, false, None),
            AutomationMode::Drain,
            &BayMemory::default(),
            None,
            start(),
        );

        assert_eq!(open.outcome.door, DoorState::Open);
        assert_eq!(closed.outcome.door, DoorState::Close);
        assert!(open.report.is_none());
    }

    #[test]
    fn should_close_and_report_when_filling_without_level() {
        let mut target = bay(1, false, None);
        target.level_sensor = None;

        let decision = evaluate(
            &target,
            AutomationMode::Pond,
            &BayMemory::default(),
            None,
            start(),
        );

        assert_eq!(decision.outcome.door, DoorState::Close);
        assert_eq!(
            decision.report,
            Some(Report::SensorUnavailable {
                bay: target.id.clone(),
                sensor: None,
            })
        );
    }

    #[test]
    fn should_stay_closed_when_upstream_has_not_released() {
        let decision = evaluate(
            &bay(2, true, Some(1.0)),
            AutomationMode::Flush,
            &BayMemory::default(),
            Some(&door(DoorState::Open)),
            start(),
        );
        assert_eq!(decision.outcome.door, DoorState::Close);
        assert!(!decision.memory.reached);
    }

    #[test]
    fn should_latch_reached_once_upstream_holds() {
        let now = start();
        let target = bay(2, true, Some(1.0));

        let first = evaluate(
            &target,
            AutomationMode::Flush,
            &BayMemory::default(),
            Some(&holding()),
            now,
        );
        assert_eq!(first.outcome.door, DoorState::Open);
        assert!(first.memory.reached);

        // upstream back to Open, the latch keeps the bay going
        let second = evaluate(
            &target,
            AutomationMode::Flush,
            &first.memory,
            Some(&door(DoorState::Open)),
            now + TimeDelta::seconds(5),
        );
        assert_eq!(second.outcome.door, DoorState::Open);
    }

    #[test]
    fn should_forget_cascade_when_mode_changes() {
        let memory = BayMemory {
            mode: AutomationMode::Flush,
            reached: true,
            water_since: Some(start()),
            flush_complete: true,
            door: DoorState::Close,
        };
        let decision = evaluate(
            &bay(2, false, Some(8.0)),
            AutomationMode::Pond,
            &memory,
            None,
            start(),
        );
        assert_eq!(decision.outcome.door, DoorState::Close);
        assert_eq!(decision.memory, BayMemory::entering(AutomationMode::Pond));
    }

    #[test]
    fn should_hold_then_complete_flush_after_time_on_water() {
        let t0 = start();
        let target = bay(1, false, Some(6.0));

        let filling = evaluate(
            &target,
            AutomationMode::Flush,
            &BayMemory::default(),
            None,
            t0,
        );
        assert_eq!(filling.outcome.door, DoorState::HoldOne);
        assert_eq!(filling.memory.water_since, Some(t0));

        let holding = evaluate(
            &target,
            AutomationMode::Flush,
            &filling.memory,
            None,
            t0 + TimeDelta::seconds(59),
        );
        assert_eq!(holding.outcome.door, DoorState::HoldOne);
        assert!(!holding.memory.flush_complete);

        let done = evaluate(
            &target,
            AutomationMode::Flush,
            &holding.memory,
            None,
            t0 + TimeDelta::seconds(60),
        );
        assert_eq!(
            done.outcome,
            BayOutcome {
                door: DoorState::Close,
                flushed: true
            }
        );
        assert!(done.outcome.releases_downstream());
    }

    #[test]
    fn should_reset_hold_timer_when_level_drops_below_min() {
        let t0 = start();
        let memory = BayMemory {
            mode: AutomationMode::Flush,
            reached: true,
            water_since: Some(t0),
            ..BayMemory::default()
        };
        let decision = evaluate(
            &bay(1, false, Some(4.0)),
            AutomationMode::Flush,
            &memory,
            None,
            t0 + TimeDelta::seconds(30),
        );
        assert_eq!(decision.outcome.door, DoorState::Open);
        assert_eq!(decision.memory.water_since, None);
    }

    #[test]
    fn should_keep_last_bay_holding_after_flush() {
        let memory = BayMemory {
            mode: AutomationMode::Flush,
            reached: true,
            flush_complete: true,
            ..BayMemory::default()
        };
        let decision = evaluate(
            &bay(3, true, Some(2.0)),
            AutomationMode::Flush,
            &memory,
            Some(&door(DoorState::Close)),
            start(),
        );
        assert_eq!(decision.outcome.door, DoorState::HoldOne);
    }

    #[test]
    fn should_follow_pond_thresholds() {
        let cases = [
            (4.9, DoorState::Open),
            (5.0, DoorState::HoldTwo),
            (15.0, DoorState::HoldTwo),
            (15.1, DoorState::Close),
        ];
        for (level, expected) in cases {
            let decision = evaluate(
                &bay(1, false, Some(level)),
                AutomationMode::Pond,
                &BayMemory::default(),
                None,
                start(),
            );
            assert_eq!(decision.outcome.door, expected, "level {level}");
        }
    }

    #[test]
    fn should_hold_two_repeatedly_in_pond_steady_state() {
        let target = bay(1, false, Some(10.0));
        let mut memory = BayMemory::default();
        let t0 = start();
        for step in 0..5 {
            let decision = evaluate(
                &target,
                AutomationMode::Pond,
                &memory,
                None,
                t0 + TimeDelta::seconds(step * 30),
            );
            assert_eq!(decision.outcome.door, DoorState::HoldTwo);
            memory = decision.memory;
        }
    }
}
