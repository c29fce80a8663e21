//! Paddock coordinator: automation modes and cascade propagation.
//!
//! The coordinator owns the stored automation modes ([`ModeBook`]) and walks
//! each paddock's bays in ascending `order`, feeding every bay the outcome of
//! the bay upstream of it. It never advances a mode on its own; modes change
//! only through [`ModeCommand`]s or by being forced `Off`.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use pwm_domain::command::{ModeCommand, ModeTarget};
use pwm_domain::error::{CommandError, NotFoundError, PwmError};
use pwm_domain::id::{BayId, DeviceId, PaddockId};
use pwm_domain::mode::{AutomationMode, DoorState};
use pwm_domain::report::Report;
use pwm_domain::slot::{DeviceCommand, commands_for};
use pwm_domain::snapshot::{ResolvedBay, ResolvedFarm, ResolvedPaddock};
use pwm_domain::time::Timestamp;

use crate::bay_machine::{self, BayMemory, BayOutcome};
use crate::conflict_guard::ProposedCommand;

/// Stored automation modes, per paddock and per bay.
///
/// Bay entries only matter while their paddock runs in individual mode; a
/// bay without an entry follows its paddock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeBook {
    paddocks: BTreeMap<PaddockId, AutomationMode>,
    bays: BTreeMap<BayId, AutomationMode>,
}

impl ModeBook {
    #[must_use]
    pub fn paddock_mode(&self, paddock: &PaddockId) -> AutomationMode {
        self.paddocks.get(paddock).copied().unwrap_or_default()
    }

    /// The mode `bay` runs in this tick.
    #[must_use]
    pub fn bay_mode(&self, paddock: &ResolvedPaddock, bay: &BayId) -> AutomationMode {
        let inherited = self.paddock_mode(&paddock.id);
        if paddock.automation_state_individual {
            self.bays.get(bay).copied().unwrap_or(inherited)
        } else {
            inherited
        }
    }

    /// Apply a mode command against the current farm snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PwmError::NotFound`] when the target does not exist,
    /// [`CommandError::PaddockDisabled`] when the target paddock is disabled
    /// and [`CommandError::NotIndividual`] when a bay is addressed while its
    /// paddock is not in individual mode.
    pub fn apply(&mut self, farm: &ResolvedFarm, command: &ModeCommand) -> Result<(), PwmError> {
        match &command.target {
            ModeTarget::Paddock(id) => {
                let paddock = farm.paddock(id).ok_or_else(|| NotFoundError {
                    entity: "paddock",
                    id: id.to_string(),
                })?;
                ensure_enabled(paddock)?;
                let mode = command.change.apply(self.paddock_mode(id));
                if paddock.automation_state_individual {
                    for bay in &paddock.bays {
                        let bay_mode = command.change.apply(self.bay_mode(paddock, &bay.id));
                        self.bays.insert(bay.id.clone(), bay_mode);
                    }
                }
                self.paddocks.insert(id.clone(), mode);
                tracing::info!(paddock = %id, %mode, "paddock mode set");
            }
            ModeTarget::Bay(id) => {
                let bay = farm.bay(id).ok_or_else(|| NotFoundError {
                    entity: "bay",
                    id: id.to_string(),
                })?;
                let paddock = farm.paddock(&bay.paddock_id).ok_or_else(|| NotFoundError {
                    entity: "paddock",
                    id: bay.paddock_id.to_string(),
                })?;
                ensure_enabled(paddock)?;
                if !paddock.automation_state_individual {
                    return Err(CommandError::NotIndividual {
                        bay: id.clone(),
                        paddock: paddock.id.clone(),
                    }
                    .into());
                }
                let mode = command.change.apply(self.bay_mode(paddock, id));
                self.bays.insert(id.clone(), mode);
                tracing::info!(bay = %id, %mode, "bay mode set");
            }
        }
        Ok(())
    }

    /// Reset `paddock` and all of its bays to `Off`.
    pub fn force_off(&mut self, paddock: &ResolvedPaddock) {
        self.paddocks.insert(paddock.id.clone(), AutomationMode::Off);
        for bay in &paddock.bays {
            self.bays.remove(&bay.id);
        }
    }

    /// Drop entries for paddocks and bays that no longer exist.
    pub fn retain_known(&mut self, farm: &ResolvedFarm) {
        self.paddocks.retain(|id, _| farm.paddock(id).is_some());
        self.bays.retain(|id, _| farm.bay(id).is_some());
    }
}

fn ensure_enabled(paddock: &ResolvedPaddock) -> Result<(), CommandError> {
    if paddock.enabled {
        Ok(())
    } else {
        Err(CommandError::PaddockDisabled {
            paddock: paddock.id.clone(),
        })
    }
}

/// Per-paddock part of a tick outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaddockOutcome {
    pub id: PaddockId,
    pub mode: AutomationMode,
    pub enabled: bool,
    /// The paddock was left out of the tick because its bay chain is invalid.
    pub excluded: bool,
    /// Bays whose mode changed this tick, in ascending order.
    pub propagated: Vec<BayId>,
}

/// Per-bay part of a tick outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BayStatus {
    pub id: BayId,
    pub paddock_id: PaddockId,
    pub order: u32,
    pub mode: AutomationMode,
    pub door: DoorState,
    /// Calibrated level used for the decision.
    pub level: Option<f64>,
    pub level_sensor: Option<DeviceId>,
    pub flushed: bool,
}

impl BayStatus {
    fn new(bay: &ResolvedBay, mode: AutomationMode, outcome: BayOutcome) -> Self {
        Self {
            id: bay.id.clone(),
            paddock_id: bay.paddock_id.clone(),
            order: bay.order,
            mode,
            door: outcome.door,
            level: bay.level,
            level_sensor: bay.level_sensor.clone(),
            flushed: outcome.flushed,
        }
    }
}

/// Everything one paddock contributes to a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddockTick {
    pub outcome: PaddockOutcome,
    pub bays: Vec<BayStatus>,
    pub proposals: Vec<ProposedCommand>,
    pub reports: Vec<Report>,
}

/// Coordinate one paddock for one tick.
///
/// `memories` holds the bay memories carried between ticks and is updated in
/// place.
#[must_use]
pub fn coordinate_paddock(
    paddock: &ResolvedPaddock,
    modes: &mut ModeBook,
    memories: &mut BTreeMap<BayId, BayMemory>,
    now: Timestamp,
) -> PaddockTick {
    if let Err(error) = &paddock.topology {
        tracing::warn!(paddock = %paddock.id, %error, "invalid bay chain, paddock held off");
        modes.force_off(paddock);
        for bay in &paddock.bays {
            memories.remove(&bay.id);
        }
        return PaddockTick {
            outcome: PaddockOutcome {
                id: paddock.id.clone(),
                mode: AutomationMode::Off,
                enabled: paddock.enabled,
                excluded: true,
                propagated: Vec::new(),
            },
            bays: Vec::new(),
            proposals: Vec::new(),
            reports: vec![Report::InvalidTopology {
                paddock: paddock.id.clone(),
                error: error.clone(),
            }],
        };
    }

    let mut chain: Vec<&ResolvedBay> = paddock.bays.iter().collect();
    chain.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));

    if !paddock.enabled {
        if modes.paddock_mode(&paddock.id) != AutomationMode::Off {
            tracing::info!(paddock = %paddock.id, "paddock disabled, mode reset to Off");
        }
        modes.force_off(paddock);
        let bays = chain
            .iter()
            .map(|bay| {
                memories.insert(bay.id.clone(), BayMemory::entering(AutomationMode::Off));
                BayStatus::new(bay, AutomationMode::Off, BayOutcome::default())
            })
            .collect();
        return PaddockTick {
            outcome: PaddockOutcome {
                id: paddock.id.clone(),
                mode: AutomationMode::Off,
                enabled: false,
                excluded: false,
                propagated: Vec::new(),
            },
            bays,
            proposals: Vec::new(),
            reports: Vec::new(),
        };
    }

    let mut tick = PaddockTick {
        outcome: PaddockOutcome {
            id: paddock.id.clone(),
            mode: modes.paddock_mode(&paddock.id),
            enabled: true,
            excluded: false,
            propagated: Vec::new(),
        },
        bays: Vec::with_capacity(chain.len()),
        proposals: Vec::new(),
        reports: Vec::new(),
    };
    let mut upstream: Option<BayOutcome> = None;
    let mut draining = BTreeSet::new();

    for bay in chain {
        let mode = modes.bay_mode(paddock, &bay.id);
        let memory = memories.remove(&bay.id).unwrap_or_default();
        if memory.mode != mode {
            tracing::info!(
                paddock = %paddock.id,
                bay = %bay.id,
                order = bay.order,
                from = %memory.mode,
                to = %mode,
                "mode propagated"
            );
            tick.outcome.propagated.push(bay.id.clone());
        }

        let decision = bay_machine::evaluate(bay, mode, &memory, upstream.as_ref(), now);
        tracing::debug!(
            bay = %bay.id,
            %mode,
            door = %decision.outcome.door,
            level = ?bay.level,
            "bay evaluated"
        );

        tick.proposals.extend(
            commands_for(mode, decision.outcome.door, &bay.slots)
                .into_iter()
                .map(|(slot, device, command)| ProposedCommand {
                    paddock: paddock.id.clone(),
                    bay: bay.id.clone(),
                    order: bay.order,
                    slot,
                    device,
                    command,
                    active: mode != AutomationMode::Off,
                }),
        );
        if mode == AutomationMode::Drain {
            draining.insert(bay.id.clone());
        }
        tick.reports.extend(decision.report);
        tick.bays.push(BayStatus::new(bay, mode, decision.outcome));
        memories.insert(bay.id.clone(), decision.memory);
        upstream = Some(decision.outcome);
    }

    yield_to_open_drains(&mut tick.proposals, &draining);
    tick
}

/// Drop supply closes of draining bays on gates another bay drains through.
///
/// A gate wired as one bay's drain and the next bay's supply is opened by the
/// upstream bay while the paddock drains; the downstream close is not a
/// competing claim.
fn yield_to_open_drains(proposals: &mut Vec<ProposedCommand>, draining: &BTreeSet<BayId>) {
    let opened: BTreeSet<DeviceId> = proposals
        .iter()
        .filter(|p| p.slot.is_drain() && p.command == DeviceCommand::Open)
        .map(|p| p.device.clone())
        .collect();
    proposals.retain(|p| {
        let yields = p.slot.is_supply()
            && p.command == DeviceCommand::Close
            && draining.contains(&p.bay)
            && opened.contains(&p.device);
        if yields {
            tracing::trace!(bay = %p.bay, device = %p.device, "supply left to upstream drain");
        }
        !yields
    });
}
