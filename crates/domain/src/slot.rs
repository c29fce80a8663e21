//! Device slots on a bay and the commands sent through them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::DeviceId;
use crate::mode::{AutomationMode, DoorState};

/// A named role a physical device can fill on a bay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeviceSlot {
    #[serde(rename = "supply_1")]
    Supply1,
    #[serde(rename = "supply_2")]
    Supply2,
    #[serde(rename = "drain_1")]
    Drain1,
    #[serde(rename = "drain_2")]
    Drain2,
}

impl DeviceSlot {
    pub const ALL: [Self; 4] = [Self::Supply1, Self::Supply2, Self::Drain1, Self::Drain2];

    #[must_use]
    pub fn is_supply(self) -> bool {
        matches!(self, Self::Supply1 | Self::Supply2)
    }

    #[must_use]
    pub fn is_drain(self) -> bool {
        matches!(self, Self::Drain1 | Self::Drain2)
    }

    /// Settings key of this slot (`supply_1`, `drain_2`, …).
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Supply1 => "supply_1",
            Self::Supply2 => "supply_2",
            Self::Drain1 => "drain_1",
            Self::Drain2 => "drain_2",
        }
    }
}

impl fmt::Display for DeviceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Target position of a door, valve or gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceCommand {
    Open,
    Close,
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Close => f.write_str("close"),
        }
    }
}

/// Device assignments of one bay, keyed by slot.
pub type SlotMap = BTreeMap<DeviceSlot, DeviceId>;

/// Translate a bay's door state into per-slot device commands.
///
/// Filling modes only drive the supply side, so a door shared as one bay's
/// drain and the next bay's supply is commanded by the downstream bay alone.
/// `Off` closes everything; `Drain` opens the drains and shuts the supplies.
/// A draining bay's supply close on a gate its upstream neighbour drains
/// through is dropped by the coordinator, not here.
#[must_use]
pub fn commands_for(
    mode: AutomationMode,
    door: DoorState,
    slots: &SlotMap,
) -> Vec<(DeviceSlot, DeviceId, DeviceCommand)> {
    slots
        .iter()
        .filter_map(|(&slot, device)| {
            let command = match (mode, door) {
                (AutomationMode::Off, _) => Some(DeviceCommand::Close),
                (AutomationMode::Drain, DoorState::Open) => Some(if slot.is_drain() {
                    DeviceCommand::Open
                } else {
                    DeviceCommand::Close
                }),
                (mode, DoorState::Open) if mode.is_filling() && slot.is_supply() => {
                    Some(DeviceCommand::Open)
                }
                (_, _) if slot.is_supply() => Some(DeviceCommand::Close),
                _ => None,
            };
            command.map(|command| (slot, device.clone(), command))
        })
        .collect()
}
