//! ---
//! sd_section: "04-simulation"
//! sd_subsection: "01-bootstrap"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "Simulation module exports and shared types."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
//! Synthetic telemetry generation for the Save Drops project.
//!
//! [`SimulationEngine`] holds the per-tick algorithm and manual overrides;
//! [`SimulationRunner`] drives it on a fixed interval and streams readings
//! into the data backend through a bounded fire-and-forget queue.

pub mod engine;
pub mod health;
pub mod runner;

pub use engine::{
    EngineStatus, NoiseSource, SimulationEngine, SimulationError, StdNoise, LEAK_FLOW_THRESHOLD,
};
pub use health::{new_registry, SharedRegistry, SyncHealth, SyncStatus};
pub use runner::{RunnerHandle, SimulationRunner};
