//! ---
//! sd_section: "05-dashboard"
//! sd_subsection: "01-bootstrap"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "Dashboard module exports."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
//! Dashboard read model for the Save Drops project.
//!
//! The reader observes the backend; it never talks to the generator
//! directly. Data flows one way: generator, backend, reader.

pub mod billing;
pub mod reader;

pub use billing::ensure_bill;
pub use reader::{DashboardReader, LiveMetrics, UsagePoint, HISTORY_LIMIT, LEAK_ALERT_FLOW};
