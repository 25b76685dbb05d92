//! ---
//! sd_section: "04-simulation"
//! sd_subsection: "module"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "Telemetry sync health counters and status."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use prometheus::{IntCounter, Opts, Registry};

/// Shared registry type used across services.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Coarse sync status exposed instead of silently discarding failed appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Appends are landing in the backend.
    Healthy,
    /// Recent appends failed; telemetry may be incomplete.
    Degraded,
}

impl SyncStatus {
    /// Static label for metrics and status payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Healthy => "healthy",
            SyncStatus::Degraded => "degraded",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metrics published by the telemetry write path.
#[derive(Clone)]
pub struct SyncHealth {
    appends_ok: IntCounter,
    append_failures: IntCounter,
    readings_dropped: IntCounter,
    consecutive_failures: Arc<AtomicU32>,
    degraded_after: u32,
}

impl SyncHealth {
    /// Register all write-path metrics with the provided registry.
    pub fn new(registry: &SharedRegistry, degraded_after: u32) -> prometheus::Result<Self> {
        let appends_ok = IntCounter::with_opts(Opts::new(
            "savedrops_readings_appended_total",
            "Total number of readings successfully appended to the backend",
        ))?;
        registry.register(Box::new(appends_ok.clone()))?;

        let append_failures = IntCounter::with_opts(Opts::new(
            "savedrops_append_failures_total",
            "Total number of reading append operations that failed",
        ))?;
        registry.register(Box::new(append_failures.clone()))?;

        let readings_dropped = IntCounter::with_opts(Opts::new(
            "savedrops_readings_dropped_total",
            "Total number of readings evicted from the bounded write queue",
        ))?;
        registry.register(Box::new(readings_dropped.clone()))?;

        Ok(Self {
            appends_ok,
            append_failures,
            readings_dropped,
            consecutive_failures: Arc::new(AtomicU32::new(0)),
            degraded_after: degraded_after.max(1),
        })
    }

    /// Record a reading landing in the backend.
    pub fn record_append_ok(&self) {
        self.appends_ok.inc();
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    /// Record a failed append attempt.
    pub fn record_append_failure(&self) {
        self.append_failures.inc();
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a reading dropped from the bounded queue before writing.
    pub fn record_dropped(&self) {
        self.readings_dropped.inc();
    }

    /// Current coarse status derived from the consecutive failure streak.
    pub fn status(&self) -> SyncStatus {
        if self.consecutive_failures.load(Ordering::SeqCst) >= self.degraded_after {
            SyncStatus::Degraded
        } else {
            SyncStatus::Healthy
        }
    }

    pub fn appended_total(&self) -> u64 {
        self.appends_ok.get()
    }

    pub fn failures_total(&self) -> u64 {
        self.append_failures.get()
    }

    pub fn dropped_total(&self) -> u64 {
        self.readings_dropped.get()
    }
}

impl fmt::Debug for SyncHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHealth")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degrades_after_consecutive_failures_and_recovers() {
        let health = SyncHealth::new(&new_registry(), 3).unwrap();
        assert_eq!(health.status(), SyncStatus::Healthy);
        health.record_append_failure();
        health.record_append_failure();
        assert_eq!(health.status(), SyncStatus::Healthy);
        health.record_append_failure();
        assert_eq!(health.status(), SyncStatus::Degraded);
        health.record_append_ok();
        assert_eq!(health.status(), SyncStatus::Healthy);
        assert_eq!(health.failures_total(), 3);
        assert_eq!(health.appended_total(), 1);
    }

    #[test]
    fn dropped_counter_accumulates() {
        let health = SyncHealth::new(&new_registry(), 1).unwrap();
        health.record_dropped();
        health.record_dropped();
        assert_eq!(health.dropped_total(), 2);
        // Drops alone do not flip the status; only failed appends do.
        assert_eq!(health.status(), SyncStatus::Healthy);
    }
}
