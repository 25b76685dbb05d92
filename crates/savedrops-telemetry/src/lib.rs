//! ---
//! sd_section: "02-telemetry-data-model"
//! sd_subsection: "01-bootstrap"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "Telemetry record schema and shared simulation state."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
//! Telemetry schema for the Save Drops project.
//!
//! A [`Reading`] is one immutable synthetic sensor sample; the generator
//! appends a new one per tick and never updates a prior record.

pub mod reading;
pub mod state;

pub use reading::Reading;
pub use state::{round1, SimulationState};
