//! ---
//! sd_section: "03-data-backend"
//! sd_subsection: "module"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "Document store with query and subscription primitives."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{Result, StoreError};

/// Identifier assigned to every stored record.
pub type RecordId = Uuid;

/// Record stored in a collection: identifier plus an arbitrary JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier assigned when the record was appended.
    pub id: RecordId,
    /// Timestamp when the record was appended to the store.
    pub created_at: DateTime<Utc>,
    /// Arbitrary JSON payload (reading, profile, bill, ...).
    pub payload: JsonValue,
}

impl Document {
    /// Fetch a payload field by name, if present.
    pub fn field(&self, name: &str) -> Option<&JsonValue> {
        self.payload.get(name)
    }
}

/// Field-equality filter; all listed fields must match.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    terms: Vec<(String, JsonValue)>,
}

impl Filter {
    /// Filter matching every record.
    pub fn any() -> Self {
        Self::default()
    }

    /// Add an equality requirement on a payload field.
    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.terms.push((field.into(), value.into()));
        self
    }

    fn matches(&self, payload: &JsonValue) -> bool {
        self.terms
            .iter()
            .all(|(field, expected)| payload.get(field) == Some(expected))
    }
}

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Ordering applied to query and subscription result sets.
#[derive(Debug, Clone)]
pub struct OrderBy {
    field: String,
    direction: Direction,
}

impl OrderBy {
    /// Sort ascending by the named payload field.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    /// Sort descending by the named payload field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }

    fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ordering = compare_values(
            a.field(&self.field).unwrap_or(&JsonValue::Null),
            b.field(&self.field).unwrap_or(&JsonValue::Null),
        );
        match self.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

/// Total order over JSON scalar values.
///
/// Strings that parse as RFC 3339 timestamps compare chronologically so that
/// ordering by `timestamp` is correct regardless of fractional-second width.
fn compare_values(a: &JsonValue, b: &JsonValue) -> Ordering {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (JsonValue::String(x), JsonValue::String(y)) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(tx), Ok(ty)) => tx.cmp(&ty),
                _ => x.cmp(y),
            }
        }
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
        (JsonValue::Null, JsonValue::Null) => Ordering::Equal,
        (JsonValue::Null, _) => Ordering::Less,
        (_, JsonValue::Null) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Callback invoked with the full current result set on every matching change.
pub type UpdateCallback = Arc<dyn Fn(&[Document]) + Send + Sync>;

struct Subscription {
    collection: String,
    filter: Filter,
    order_by: OrderBy,
    limit: Option<usize>,
    on_update: UpdateCallback,
}

/// Handle returned by [`DocumentStore::subscribe`]; pass back to
/// [`DocumentStore::unsubscribe`] on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

#[derive(Default)]
struct Inner {
    collections: RwLock<HashMap<String, IndexMap<RecordId, Document>>>,
    subscriptions: RwLock<HashMap<u64, Subscription>>,
    next_subscription: AtomicU64,
    offline: AtomicBool,
}

/// In-memory document store with live query subscriptions.
///
/// Cheap to clone; all clones share the same collections and subscribers.
#[derive(Clone, Default)]
pub struct DocumentStore {
    inner: Arc<Inner>,
}

impl DocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle failure injection. While offline every read and write returns
    /// [`StoreError::Network`].
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, AtomicOrdering::SeqCst);
        if offline {
            warn!("document store switched offline; writes will fail");
        }
    }

    fn check_online(&self) -> Result<()> {
        if self.inner.offline.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Network);
        }
        Ok(())
    }

    /// Append a new record and notify matching subscribers.
    pub fn append(&self, collection: &str, payload: JsonValue) -> Result<RecordId> {
        self.check_online()?;
        let document = Document {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            payload,
        };
        let id = document.id;
        {
            let mut collections = self.inner.collections.write();
            collections
                .entry(collection.to_owned())
                .or_default()
                .insert(id, document.clone());
        }
        debug!(collection, record = %id, "record appended");
        self.notify(collection, &document.payload);
        Ok(id)
    }

    /// Merge top-level fields of `partial` into an existing record and notify
    /// matching subscribers.
    pub fn update(&self, collection: &str, id: RecordId, partial: JsonValue) -> Result<()> {
        self.check_online()?;
        let updated_payload;
        {
            let mut collections = self.inner.collections.write();
            let records =
                collections
                    .get_mut(collection)
                    .ok_or_else(|| StoreError::MissingRecord {
                        collection: collection.to_owned(),
                        id,
                    })?;
            let document = records.get_mut(&id).ok_or_else(|| StoreError::MissingRecord {
                collection: collection.to_owned(),
                id,
            })?;
            let target = document
                .payload
                .as_object_mut()
                .ok_or_else(|| StoreError::NotAnObject {
                    collection: collection.to_owned(),
                    id,
                })?;
            if let JsonValue::Object(fields) = partial {
                for (key, value) in fields {
                    target.insert(key, value);
                }
            }
            updated_payload = document.payload.clone();
        }
        debug!(collection, record = %id, "record updated");
        self.notify(collection, &updated_payload);
        Ok(())
    }

    /// Fetch a record by identifier.
    pub fn get(&self, collection: &str, id: RecordId) -> Result<Option<Document>> {
        self.check_online()?;
        let collections = self.inner.collections.read();
        Ok(collections
            .get(collection)
            .and_then(|records| records.get(&id))
            .cloned())
    }

    /// One-shot filtered, ordered, limited listing of a collection.
    pub fn query(
        &self,
        collection: &str,
        filter: &Filter,
        order_by: &OrderBy,
        limit: Option<usize>,
    ) -> Result<Vec<Document>> {
        self.check_online()?;
        let collections = self.inner.collections.read();
        Ok(Self::result_set(
            collections.get(collection),
            filter,
            order_by,
            limit,
        ))
    }

    /// Register a standing subscription. The callback fires with the full
    /// current result set each time a matching record is appended or updated.
    pub fn subscribe(
        &self,
        collection: &str,
        filter: Filter,
        order_by: OrderBy,
        limit: Option<usize>,
        on_update: UpdateCallback,
    ) -> SubscriptionHandle {
        let id = self
            .inner
            .next_subscription
            .fetch_add(1, AtomicOrdering::SeqCst);
        self.inner.subscriptions.write().insert(
            id,
            Subscription {
                collection: collection.to_owned(),
                filter,
                order_by,
                limit,
                on_update,
            },
        );
        debug!(collection, subscription = id, "subscription registered");
        SubscriptionHandle(id)
    }

    /// Remove a subscription; no callbacks are delivered after this returns.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        if self.inner.subscriptions.write().remove(&handle.0).is_some() {
            debug!(subscription = handle.0, "subscription removed");
        }
    }

    fn result_set(
        records: Option<&IndexMap<RecordId, Document>>,
        filter: &Filter,
        order_by: &OrderBy,
        limit: Option<usize>,
    ) -> Vec<Document> {
        let mut matched: Vec<Document> = records
            .map(|records| {
                records
                    .values()
                    .filter(|document| filter.matches(&document.payload))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matched.sort_by(|a, b| order_by.compare(a, b));
        if let Some(limit) = limit {
            matched.truncate(limit);
        }
        matched
    }

    /// Deliver result sets to subscribers whose filter matches the changed
    /// payload. Callbacks run with no store lock held.
    fn notify(&self, collection: &str, changed: &JsonValue) {
        let mut deliveries: Vec<(UpdateCallback, Vec<Document>)> = Vec::new();
        {
            let collections = self.inner.collections.read();
            let subscriptions = self.inner.subscriptions.read();
            for subscription in subscriptions.values() {
                if subscription.collection != collection
                    || !subscription.filter.matches(changed)
                {
                    continue;
                }
                deliveries.push((
                    subscription.on_update.clone(),
                    Self::result_set(
                        collections.get(collection),
                        &subscription.filter,
                        &subscription.order_by,
                        subscription.limit,
                    ),
                ));
            }
        }
        for (on_update, results) in deliveries {
            on_update(&results);
        }
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn append_then_query_orders_and_limits() {
        let store = DocumentStore::new();
        for flow in [10.0, 30.0, 20.0] {
            store
                .append("readings", json!({"userId": "u1", "flow": flow}))
                .unwrap();
        }
        store
            .append("readings", json!({"userId": "u2", "flow": 99.0}))
            .unwrap();

        let results = store
            .query(
                "readings",
                &Filter::any().field_eq("userId", "u1"),
                &OrderBy::desc("flow"),
                Some(2),
            )
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].payload["flow"], json!(30.0));
        assert_eq!(results[1].payload["flow"], json!(20.0));
    }

    #[test]
    fn timestamp_strings_order_chronologically() {
        let store = DocumentStore::new();
        // Mixed fractional widths would sort wrongly as plain strings.
        store
            .append("readings", json!({"timestamp": "2026-01-01T00:00:00.5Z"}))
            .unwrap();
        store
            .append("readings", json!({"timestamp": "2026-01-01T00:00:00Z"}))
            .unwrap();
        let results = store
            .query(
                "readings",
                &Filter::any(),
                &OrderBy::desc("timestamp"),
                None,
            )
            .unwrap();
        assert_eq!(
            results[0].payload["timestamp"],
            json!("2026-01-01T00:00:00.5Z")
        );
    }

    #[test]
    fn update_merges_fields_in_place() {
        let store = DocumentStore::new();
        let id = store
            .append("readings", json!({"motorStatus": false, "flow": 2.0}))
            .unwrap();
        store
            .update("readings", id, json!({"motorStatus": true}))
            .unwrap();
        let document = store.get("readings", id).unwrap().unwrap();
        assert_eq!(document.payload["motorStatus"], json!(true));
        assert_eq!(document.payload["flow"], json!(2.0));
    }

    #[test]
    fn update_missing_record_fails() {
        let store = DocumentStore::new();
        let err = store
            .update("readings", Uuid::new_v4(), json!({"flow": 1.0}))
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingRecord { .. }));
    }

    #[test]
    fn subscription_receives_current_result_set() {
        let store = DocumentStore::new();
        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handle = store.subscribe(
            "readings",
            Filter::any().field_eq("userId", "u1"),
            OrderBy::desc("flow"),
            Some(1),
            Arc::new(move |results: &[Document]| sink.lock().push(results.len())),
        );

        store
            .append("readings", json!({"userId": "u1", "flow": 5.0}))
            .unwrap();
        store
            .append("readings", json!({"userId": "other", "flow": 9.0}))
            .unwrap();
        store
            .append("readings", json!({"userId": "u1", "flow": 6.0}))
            .unwrap();
        assert_eq!(seen.lock().as_slice(), &[1, 1]);

        store.unsubscribe(handle);
        store
            .append("readings", json!({"userId": "u1", "flow": 7.0}))
            .unwrap();
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn offline_store_rejects_writes() {
        let store = DocumentStore::new();
        store.set_offline(true);
        let err = store.append("readings", json!({})).unwrap_err();
        assert!(matches!(err, StoreError::Network));
        store.set_offline(false);
        store.append("readings", json!({})).unwrap();
    }
}
