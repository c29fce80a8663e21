//! Reports: non-fatal conditions collected during a tick.
//!
//! Nothing in the control core raises on a misconfigured or degraded unit.
//! Instead each condition becomes a [`Report`] in the tick outcome, and the
//! caller decides whether anyone needs to be notified.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{BayId, DeviceId, PaddockId};
use crate::slot::{DeviceCommand, DeviceSlot};
use crate::topology::TopologyError;

/// How much attention a report deserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A non-fatal condition observed while evaluating a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    /// Settings were missing or unreadable and defaults were applied.
    ConfigIncomplete { subject: String, detail: String },

    /// A filling bay had no usable level reading and was closed.
    SensorUnavailable {
        bay: BayId,
        /// The configured sensor, or `None` when no sensor is assigned.
        sensor: Option<DeviceId>,
    },

    /// Two bays asked for different positions of the same device.
    DeviceConflict {
        device: DeviceId,
        winner: BayId,
        winner_slot: DeviceSlot,
        granted: DeviceCommand,
        loser: BayId,
        loser_slot: DeviceSlot,
        requested: DeviceCommand,
    },

    /// A mode command could not be applied and was dropped.
    CommandRejected { command: String, reason: String },

    /// The paddock's bay chain is malformed; it is held `Off` this tick.
    InvalidTopology {
        paddock: PaddockId,
        error: TopologyError,
    },
}

impl Report {
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::ConfigIncomplete { .. } => Severity::Info,
            Self::SensorUnavailable { .. }
            | Self::DeviceConflict { .. }
            | Self::CommandRejected { .. } => Severity::Warning,
            Self::InvalidTopology { .. } => Severity::Error,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigIncomplete { subject, detail } => {
                write!(f, "config incomplete for {subject}: {detail}")
            }
            Self::SensorUnavailable {
                bay,
                sensor: Some(sensor),
            } => write!(f, "bay {bay}: level sensor {sensor} unavailable"),
            Self::SensorUnavailable { bay, sensor: None } => {
                write!(f, "bay {bay}: no level sensor assigned")
            }
            Self::DeviceConflict {
                device,
                winner,
                granted,
                loser,
                requested,
                ..
            } => write!(
                f,
                "device {device}: {loser} requested {requested} but {winner} holds it {granted}"
            ),
            Self::CommandRejected { command, reason } => {
                write!(f, "command `{command}` rejected: {reason}")
            }
            Self::InvalidTopology { paddock, error } => {
                write!(f, "paddock {paddock}: {error}")
            }
        }
    }
}
