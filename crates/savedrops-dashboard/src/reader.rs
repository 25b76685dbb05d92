//! ---
//! sd_section: "05-dashboard"
//! sd_subsection: "module"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "Live subscription, derived metrics, and usage history."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use savedrops_backend::{
    collections, DocumentStore, Filter, OrderBy, RecordId, Result, SubscriptionHandle,
};
use savedrops_common::clock_time;
use savedrops_telemetry::Reading;

/// Flow rate (L/min) above which the dashboard raises the leak alert even
/// when the reading itself is not flagged.
pub const LEAK_ALERT_FLOW: f64 = 100.0;

/// Number of readings loaded for the usage chart.
pub const HISTORY_LIMIT: usize = 10;

/// Metrics derived from the most recent reading. Defaults apply while no
/// reading exists yet.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LiveMetrics {
    pub tank_level: f64,
    pub flow_rate: f64,
    pub motor_status: bool,
    pub leak_alert: bool,
}

impl LiveMetrics {
    fn from_payload(payload: &JsonValue) -> Self {
        let flow_rate = payload["flow"].as_f64().unwrap_or(0.0);
        let leak_detected = payload["leakDetected"].as_bool().unwrap_or(false);
        Self {
            tank_level: payload["tankLevel"].as_f64().unwrap_or(0.0),
            flow_rate,
            motor_status: payload["motorStatus"].as_bool().unwrap_or(false),
            leak_alert: leak_detected || flow_rate > LEAK_ALERT_FLOW,
        }
    }
}

/// One point on the flow-over-time chart.
#[derive(Debug, Clone, PartialEq)]
pub struct UsagePoint {
    /// Wall-clock label, `HH:MM:SS`.
    pub time: String,
    pub flow: f64,
}

/// Observes the latest reading for one user and derives display state.
///
/// Holds a standing subscription from attach until [`detach`] or drop; the
/// live metrics keep their last-known values if the backend degrades.
///
/// [`detach`]: DashboardReader::detach
pub struct DashboardReader {
    store: DocumentStore,
    user_id: String,
    live: Arc<RwLock<LiveMetrics>>,
    latest: Arc<RwLock<Option<JsonValue>>>,
    subscription: Option<SubscriptionHandle>,
}

impl DashboardReader {
    /// Subscribe to the user's most recent reading.
    pub fn attach(store: DocumentStore, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        let live: Arc<RwLock<LiveMetrics>> = Arc::new(RwLock::new(LiveMetrics::default()));
        let latest: Arc<RwLock<Option<JsonValue>>> = Arc::new(RwLock::new(None));

        let live_sink = live.clone();
        let latest_sink = latest.clone();
        let subscription = store.subscribe(
            collections::READINGS,
            Filter::any().field_eq("userId", user_id.as_str()),
            OrderBy::desc("timestamp"),
            Some(1),
            Arc::new(move |results| {
                if let Some(document) = results.first() {
                    *live_sink.write() = LiveMetrics::from_payload(&document.payload);
                    *latest_sink.write() = Some(document.payload.clone());
                }
            }),
        );
        debug!(user = %user_id, "dashboard attached");

        Self {
            store,
            user_id,
            live,
            latest,
            subscription: Some(subscription),
        }
    }

    /// Current derived metrics.
    pub fn metrics(&self) -> LiveMetrics {
        *self.live.read()
    }

    /// Last [`HISTORY_LIMIT`] readings in chronological order, mapped for
    /// charting.
    pub fn history(&self) -> Result<Vec<UsagePoint>> {
        let mut documents = self.store.query(
            collections::READINGS,
            &Filter::any().field_eq("userId", self.user_id.as_str()),
            &OrderBy::desc("timestamp"),
            Some(HISTORY_LIMIT),
        )?;
        documents.reverse();
        Ok(documents
            .into_iter()
            .map(|document| {
                let timestamp = document
                    .field("timestamp")
                    .and_then(JsonValue::as_str)
                    .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                    .map(|parsed| parsed.with_timezone(&Utc))
                    .unwrap_or(document.created_at);
                UsagePoint {
                    time: clock_time(timestamp),
                    flow: document
                        .field("flow")
                        .and_then(JsonValue::as_f64)
                        .unwrap_or(0.0),
                }
            })
            .collect())
    }

    /// Toggle the pump from the dashboard.
    ///
    /// Always appends a new reading rather than mutating the latest one, so
    /// the `readings` collection stays append-only. With no reading cached
    /// yet, a record with default sensor values and the toggled flag is
    /// created.
    pub fn toggle_motor(&self) -> Result<RecordId> {
        let cached = self.latest.read().clone();
        let reading = match cached {
            Some(payload) => match serde_json::from_value::<Reading>(payload) {
                Ok(mut reading) => {
                    reading.motor_status = !reading.motor_status;
                    reading.timestamp = Utc::now();
                    reading
                }
                Err(err) => {
                    warn!(error = %err, "cached reading malformed; using defaults");
                    Reading::with_default_sensors(&self.user_id, !self.metrics().motor_status)
                }
            },
            None => Reading::with_default_sensors(&self.user_id, !self.metrics().motor_status),
        };
        self.store
            .append(collections::READINGS, serde_json::to_value(&reading)?)
    }

    /// Cancel the subscription; no further updates are applied.
    pub fn detach(&mut self) {
        if let Some(handle) = self.subscription.take() {
            self.store.unsubscribe(handle);
            debug!(user = %self.user_id, "dashboard detached");
        }
    }
}

impl Drop for DashboardReader {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for DashboardReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardReader")
            .field("user_id", &self.user_id)
            .field("metrics", &self.metrics())
            .finish_non_exhaustive()
    }
}
