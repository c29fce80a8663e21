//! # pwm-adapter-virtual
//!
//! Virtual/demo integration that simulates the field side of a PWM farm.
//!
//! ## Provided pieces
//!
//! | Piece | Port | Behaviour |
//! |-------|------|-----------|
//! | [`VirtualLevelSensors`] | `LevelSensorReader` | Holds raw level readings in memory |
//! | [`VirtualHydraulics`] | subscribes to the outcome bus | Raises or lowers levels of open bays |
//!
//! ## Dependency rule
//!
//! Depends on `pwm-app` (port traits, tick outcome) and `pwm-domain` only.

mod hydraulics;
mod sensor;

pub use hydraulics::{HydraulicsConfig, VirtualHydraulics};
pub use sensor::VirtualLevelSensors;
