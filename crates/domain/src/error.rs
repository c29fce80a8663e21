//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`PwmError`]
//! via `#[from]`. Conditions that the control loop tolerates (missing
//! settings, sensor outages, device conflicts) are not errors: they are
//! collected as [`Report`](crate::report::Report)s instead.

use crate::id::{BayId, PaddockId};

/// Base error for the PWM workspace.
#[derive(Debug, thiserror::Error)]
pub enum PwmError {
    /// A domain invariant was violated while building a value.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced record does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// A mode command could not be applied.
    #[error("mode command rejected")]
    Command(#[from] CommandError),

    /// Failure reported by a store or sensor adapter.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Invariant violations detected when constructing domain values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("identifier must not be empty")]
    EmptyId,

    #[error("a paddock needs at least one bay")]
    NoBays,

    #[error("duplicate identifier: {0}")]
    DuplicateId(String),
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Reasons a mode command is refused by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Per-bay modes are only accepted when the paddock runs in individual mode.
    #[error("bay {bay} cannot take its own mode: paddock {paddock} is not in individual mode")]
    NotIndividual { bay: BayId, paddock: PaddockId },

    /// A disabled paddock is held `Off` and takes no mode commands.
    #[error("paddock {paddock} is disabled")]
    PaddockDisabled { paddock: PaddockId },

    /// The command channel is closed; the control loop has stopped.
    #[error("control loop is not running")]
    LoopStopped,
}
