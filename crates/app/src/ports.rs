//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the control core and the outside world.
//! They are defined here (in `app`) so that both the control loop and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod outcome;
pub mod sensor;
pub mod store;

pub use outcome::OutcomePublisher;
pub use sensor::LevelSensorReader;
pub use store::{SettingsSource, TopologySource};
