//! ---
//! sd_section: "02-telemetry-data-model"
//! sd_subsection: "module"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "Telemetry record schema and shared simulation state."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::SimulationState;

/// One immutable synthetic telemetry sample.
///
/// Wire field names match the original `readings` documents, so persisted
/// payloads stay interchangeable with the hosted-store schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "tankLevel")]
    pub tank_level: f64,
    #[serde(rename = "flow")]
    pub flow_rate: f64,
    #[serde(rename = "motorStatus")]
    pub motor_status: bool,
    pub pressure: f64,
    pub ph: f64,
    pub turbidity: f64,
    pub conductivity: i64,
    pub temperature: f64,
    #[serde(rename = "leakDetected")]
    pub leak_detected: bool,
}

impl Reading {
    /// Capture the current simulation state as a reading with an
    /// emission-time timestamp.
    pub fn from_state(user_id: &str, state: &SimulationState) -> Self {
        Self {
            user_id: user_id.to_owned(),
            timestamp: Utc::now(),
            tank_level: state.tank_level,
            flow_rate: state.flow_rate,
            motor_status: state.motor_status,
            pressure: state.pressure,
            ph: state.ph,
            turbidity: state.turbidity,
            conductivity: state.conductivity,
            temperature: state.temperature,
            leak_detected: state.leak_detected,
        }
    }

    /// Reading with default sensor values and an explicit motor flag, used
    /// when the dashboard toggles the pump before any telemetry exists.
    pub fn with_default_sensors(user_id: &str, motor_status: bool) -> Self {
        let mut state = SimulationState::default();
        state.motor_status = motor_status;
        Self::from_state(user_id, &state)
    }
}
