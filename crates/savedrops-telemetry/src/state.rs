//! ---
//! sd_section: "02-telemetry-data-model"
//! sd_subsection: "module"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "Telemetry record schema and shared simulation state."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// In-memory sensor state owned by the generator between ticks.
///
/// Mutated once per tick and by the manual override handlers; discarded when
/// the simulator shuts down. Never persisted directly, only captured into
/// [`crate::Reading`] records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    /// Percent full, clamped to [0, 100].
    pub tank_level: f64,
    /// Litres per minute, never negative.
    pub flow_rate: f64,
    /// True while the pump is running.
    pub motor_status: bool,
    /// Bar.
    pub pressure: f64,
    pub ph: f64,
    /// NTU.
    pub turbidity: f64,
    /// µS/cm.
    pub conductivity: i64,
    /// Degrees Celsius.
    pub temperature: f64,
    pub leak_detected: bool,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            tank_level: 75.0,
            flow_rate: 50.0,
            motor_status: false,
            pressure: 2.5,
            ph: 7.0,
            turbidity: 1.2,
            conductivity: 300,
            temperature: 25.0,
            leak_detected: false,
        }
    }
}

/// Round to one decimal, matching the precision the sensors report.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_matches_reset_vector() {
        let state = SimulationState::default();
        assert_eq!(state.tank_level, 75.0);
        assert_eq!(state.flow_rate, 50.0);
        assert!(!state.motor_status);
        assert_eq!(state.pressure, 2.5);
        assert_eq!(state.ph, 7.0);
        assert_eq!(state.turbidity, 1.2);
        assert_eq!(state.conductivity, 300);
        assert_eq!(state.temperature, 25.0);
        assert!(!state.leak_detected);
    }

    #[test]
    fn round1_keeps_one_decimal() {
        assert_eq!(round1(75.24999), 75.2);
        assert_eq!(round1(75.25), 75.3);
        assert_eq!(round1(0.0), 0.0);
    }
}
