//! Automation modes and door control states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Intended behaviour of a paddock (or of a single bay in individual mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AutomationMode {
    #[default]
    Off,
    Flush,
    Pond,
    Drain,
}

impl AutomationMode {
    /// All modes in cycle order.
    pub const ALL: [Self; 4] = [Self::Off, Self::Flush, Self::Pond, Self::Drain];

    /// The next mode along the cycle `Off → Flush → Pond → Drain → Off`.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Off => Self::Flush,
            Self::Flush => Self::Pond,
            Self::Pond => Self::Drain,
            Self::Drain => Self::Off,
        }
    }

    /// Whether bays in this mode fill from upstream and depend on the level sensor.
    #[must_use]
    pub fn is_filling(self) -> bool {
        matches!(self, Self::Flush | Self::Pond)
    }
}

impl fmt::Display for AutomationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("Off"),
            Self::Flush => f.write_str("Flush"),
            Self::Pond => f.write_str("Pond"),
            Self::Drain => f.write_str("Drain"),
        }
    }
}

/// Error returned when a mode label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown automation mode: {0}")]
pub struct UnknownModeError(pub String);

impl FromStr for AutomationMode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownModeError(s.to_string()))
    }
}

/// Physical actuation state of a bay, derived every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DoorState {
    #[default]
    Close,
    Open,
    HoldOne,
    HoldTwo,
}

impl DoorState {
    /// Whether this state holds water in the bay.
    #[must_use]
    pub fn is_holding(self) -> bool {
        matches!(self, Self::HoldOne | Self::HoldTwo)
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Close => f.write_str("Close"),
            Self::Open => f.write_str("Open"),
            Self::HoldOne => f.write_str("Hold One"),
            Self::HoldTwo => f.write_str("Hold Two"),
        }
    }
}
