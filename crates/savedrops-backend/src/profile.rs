//! ---
//! sd_section: "03-data-backend"
//! sd_subsection: "module"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "Typed CRUD over user profile and settings collections."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::{collections, DocumentStore, Filter, OrderBy, Result};

/// Coordinates captured from the profile form. Stored as strings, matching
/// the original documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GeoPoint {
    pub latitude: String,
    pub longitude: String,
}

/// Editable per-user profile stored in the `users` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub location: GeoPoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub email: bool,
    pub push: bool,
    pub sms: bool,
    pub marketing: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email: true,
            push: true,
            sms: false,
            marketing: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceSettings {
    pub theme: String,
    pub language: String,
    pub timezone: String,
    pub currency: String,
}

impl Default for PreferenceSettings {
    fn default() -> Self {
        Self {
            theme: "system".to_owned(),
            language: "en".to_owned(),
            timezone: "UTC".to_owned(),
            currency: "USD".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacySettings {
    pub profile_visibility: String,
    pub data_sharing: bool,
    pub search_visibility: bool,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            profile_visibility: "private".to_owned(),
            data_sharing: false,
            search_visibility: false,
        }
    }
}

/// Notification, preference, and privacy toggles for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserSettings {
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub preferences: PreferenceSettings,
    #[serde(default)]
    pub privacy: PrivacySettings,
}

/// Load-or-default / upsert surface over the `users` and `userSettings`
/// collections.
#[derive(Debug, Clone)]
pub struct AccountDirectory {
    store: DocumentStore,
}

impl AccountDirectory {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Profile for the user, or defaults when none is stored yet.
    pub fn load_profile(&self, user_id: &str) -> Result<UserProfile> {
        self.load(collections::USERS, user_id)
    }

    /// Create or replace the profile fields for the user, marking the
    /// profile complete.
    pub fn save_profile(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        let mut payload = serde_json::to_value(profile)?;
        if let Some(fields) = payload.as_object_mut() {
            fields.insert("profileComplete".into(), JsonValue::Bool(true));
        }
        self.upsert(collections::USERS, user_id, payload)
    }

    /// Settings for the user, or defaults when none are stored yet.
    pub fn load_settings(&self, user_id: &str) -> Result<UserSettings> {
        self.load(collections::USER_SETTINGS, user_id)
    }

    /// Create or replace the settings document for the user.
    pub fn save_settings(&self, user_id: &str, settings: &UserSettings) -> Result<()> {
        let payload = serde_json::to_value(settings)?;
        self.upsert(collections::USER_SETTINGS, user_id, payload)
    }

    fn load<T>(&self, collection: &str, user_id: &str) -> Result<T>
    where
        T: Default + for<'de> Deserialize<'de>,
    {
        let docs = self.store.query(
            collection,
            &Filter::any().field_eq("userId", user_id),
            &OrderBy::desc("createdAt"),
            Some(1),
        )?;
        match docs.into_iter().next() {
            Some(document) => Ok(serde_json::from_value(document.payload)?),
            None => Ok(T::default()),
        }
    }

    fn upsert(&self, collection: &str, user_id: &str, mut payload: JsonValue) -> Result<()> {
        if let Some(fields) = payload.as_object_mut() {
            fields.insert("userId".into(), JsonValue::String(user_id.to_owned()));
        }
        let existing = self.store.query(
            collection,
            &Filter::any().field_eq("userId", user_id),
            &OrderBy::desc("createdAt"),
            Some(1),
        )?;
        match existing.into_iter().next() {
            Some(document) => {
                debug!(collection, user = %user_id, "updating existing document");
                self.store.update(collection, document.id, payload)
            }
            None => {
                debug!(collection, user = %user_id, "creating document");
                self.store.append(collection, payload).map(|_| ())
            }
        }
    }
}
