//! # pwm-app
//!
//! Application layer: the PWM control core and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement:
//!   - `TopologySource` / `SettingsSource`: registry snapshots, loaded every tick
//!   - `LevelSensorReader`: live water-level readings
//!   - `OutcomePublisher`: hands tick outcomes to rendering/actuation
//! - **Config resolver**: topology + settings into an immutable per-tick snapshot
//! - **Paddock coordinator** and **bay state machine**: modes, cascade, door states
//! - **Device conflict guard**: one command per physical device
//! - **Control loop**: interval/wake-driven ticks with a sensor deadline
//! - Provide **in-process infrastructure** (outcome bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `pwm-domain` only (plus `tokio` for channels, timers and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod bay_machine;
pub mod conflict_guard;
pub mod control_loop;
pub mod controller;
pub mod coordinator;
pub mod event_bus;
pub mod ports;
pub mod resolver;
