//! Mode commands issued by the external control surface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::id::{BayId, PaddockId};
use crate::mode::AutomationMode;

/// What a mode command addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ModeTarget {
    Paddock(PaddockId),
    Bay(BayId),
}

/// How the mode of the target changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeChange {
    /// Jump straight to a mode.
    Set(AutomationMode),
    /// Step to the next mode of the cycle.
    Advance,
}

impl ModeChange {
    /// Apply this change to `current`.
    #[must_use]
    pub fn apply(self, current: AutomationMode) -> AutomationMode {
        match self {
            Self::Set(mode) => mode,
            Self::Advance => current.next(),
        }
    }
}

/// An edge-triggered request to change an automation mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeCommand {
    pub target: ModeTarget,
    pub change: ModeChange,
}

impl ModeCommand {
    #[must_use]
    pub fn paddock(id: impl Into<PaddockId>, mode: AutomationMode) -> Self {
        Self {
            target: ModeTarget::Paddock(id.into()),
            change: ModeChange::Set(mode),
        }
    }

    #[must_use]
    pub fn bay(id: impl Into<BayId>, mode: AutomationMode) -> Self {
        Self {
            target: ModeTarget::Bay(id.into()),
            change: ModeChange::Set(mode),
        }
    }
}

impl fmt::Display for ModeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            ModeTarget::Paddock(id) => write!(f, "paddock {id}")?,
            ModeTarget::Bay(id) => write!(f, "bay {id}")?,
        }
        match self.change {
            ModeChange::Set(mode) => write!(f, " {mode}"),
            ModeChange::Advance => f.write_str(" next"),
        }
    }
}

/// Error returned for a malformed textual command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected `paddock|bay <id> <off|flush|pond|drain|next>`, got {0:?}")]
pub struct ParseCommandError(pub String);

impl FromStr for ModeCommand {
    type Err = ParseCommandError;

    /// Parse `paddock <id> <mode|next>` or `bay <id> <mode|next>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseCommandError(s.to_string());
        let mut words = s.split_whitespace();
        let (Some(kind), Some(id), Some(change), None) =
            (words.next(), words.next(), words.next(), words.next())
        else {
            return Err(err());
        };
        let target = match kind.to_ascii_lowercase().as_str() {
            "paddock" => ModeTarget::Paddock(PaddockId::new(id)),
            "bay" => ModeTarget::Bay(BayId::new(id)),
            _ => return Err(err()),
        };
        let change = if change.eq_ignore_ascii_case("next") {
            ModeChange::Advance
        } else {
            ModeChange::Set(change.parse().map_err(|_| err())?)
        };
        Ok(Self { target, change })
    }
}
