//! ---
//! sd_section: "03-data-backend"
//! sd_subsection: "01-bootstrap"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "Data backend module exports and shared error types."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
//! In-process data backend for the Save Drops project.
//!
//! Provides the narrow contract the generator and dashboard depend on: an
//! authenticated document store with append / update / get / query /
//! subscribe primitives over named collections. Records are owned by the
//! store; the generator only appends and the dashboard only lists and
//! observes.

pub mod auth;
pub mod profile;
pub mod store;

pub use auth::{AuthError, AuthService, UserSession};
pub use profile::{
    AccountDirectory, GeoPoint, NotificationSettings, PreferenceSettings, PrivacySettings,
    UserProfile, UserSettings,
};
pub use store::{
    Direction, Document, DocumentStore, Filter, OrderBy, RecordId, SubscriptionHandle,
};

/// Collection names shared with the original hosted-store schema.
pub mod collections {
    /// Immutable telemetry samples, one per generator tick.
    pub const READINGS: &str = "readings";
    /// Per-user profile documents.
    pub const USERS: &str = "users";
    /// Notification, preference, and privacy toggles.
    pub const USER_SETTINGS: &str = "userSettings";
    /// Per-user running bill amounts.
    pub const BILLS: &str = "bills";
}

/// Errors surfaced by store reads and writes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend is unreachable. Raised when failure injection is active.
    #[error("network error: backend unreachable")]
    Network,
    /// An update or get referenced a record that does not exist.
    #[error("record {id} not found in collection '{collection}'")]
    MissingRecord {
        /// Collection that was addressed.
        collection: String,
        /// Identifier that failed to resolve.
        id: store::RecordId,
    },
    /// A partial update targeted a record whose payload is not an object.
    #[error("record {id} in collection '{collection}' is not an object")]
    NotAnObject {
        /// Collection that was addressed.
        collection: String,
        /// Identifier of the malformed record.
        id: store::RecordId,
    },
    /// Wrapper for JSON serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the backend crate.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::Network;
        assert_eq!(format!("{err}"), "network error: backend unreachable");
    }
}
