//! ---
//! sd_section: "01-core-functionality"
//! sd_subsection: "module"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "Shared primitives and utilities for the Save Drops runtime."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
//! Core shared primitives for the Save Drops workspace.
//! This crate exposes configuration loading, logging bootstrap, and
//! time formatting utilities consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{AppConfig, DemoAccountConfig, LoggingConfig, SimulationConfig};
pub use logging::{init_tracing, LogFormat};
pub use time::clock_time;
