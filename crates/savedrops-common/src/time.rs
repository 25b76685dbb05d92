//! ---
//! sd_section: "01-core-functionality"
//! sd_subsection: "module"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "Shared primitives and utilities for the Save Drops runtime."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};

/// Format a timestamp as a wall-clock label for chart axes.
pub fn clock_time(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_clock_time() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 4, 9, 5, 7).unwrap();
        assert_eq!(clock_time(ts), "09:05:07");
    }
}
