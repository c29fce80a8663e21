//! # pwm-domain
//!
//! Pure domain model for Precision Water Management irrigation control.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define the **topology**: farms, paddocks and their ordered bay chains
//! - Define the **settings** records in both the current and the legacy layout
//! - Define **automation modes**, **door states**, **device slots** and **commands**
//! - Define the per-tick **resolved snapshot** and the **reports** a tick yields
//! - Contain all invariant enforcement (bay chain, id derivation)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod command;
pub mod mode;
pub mod report;
pub mod settings;
pub mod slot;
pub mod snapshot;
pub mod topology;
