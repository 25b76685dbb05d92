//! ---
//! sd_section: "05-dashboard"
//! sd_subsection: "module"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "Per-user bill lookup stub."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
use chrono::Utc;
use serde_json::json;
use tracing::debug;

use savedrops_backend::{collections, DocumentStore, Filter, OrderBy, Result};

/// Look up the user's bill, creating a zero-amount record on first visit.
///
/// No usage-based computation happens here; the amount stays 0.0 unless set
/// externally.
pub fn ensure_bill(store: &DocumentStore, user_id: &str) -> Result<f64> {
    let existing = store.query(
        collections::BILLS,
        &Filter::any().field_eq("userId", user_id),
        &OrderBy::desc("date"),
        Some(1),
    )?;
    if let Some(document) = existing.into_iter().next() {
        return Ok(document
            .field("amount")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0));
    }

    debug!(user = %user_id, "creating initial bill");
    store.append(
        collections::BILLS,
        json!({
            "userId": user_id,
            "amount": 0.0,
            "date": Utc::now(),
        }),
    )?;
    Ok(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn creates_zero_bill_once() {
        let store = DocumentStore::new();
        assert_eq!(ensure_bill(&store, "user-1").unwrap(), 0.0);
        assert_eq!(ensure_bill(&store, "user-1").unwrap(), 0.0);
        let bills = store
            .query(
                collections::BILLS,
                &Filter::any().field_eq("userId", "user-1"),
                &OrderBy::desc("date"),
                None,
            )
            .unwrap();
        assert_eq!(bills.len(), 1);
    }

    #[test]
    fn returns_externally_set_amount() {
        let store = DocumentStore::new();
        store
            .append(
                collections::BILLS,
                json!({"userId": "user-2", "amount": 12.5, "date": Utc::now()}),
            )
            .unwrap();
        assert_eq!(ensure_bill(&store, "user-2").unwrap(), 12.5);
    }
}
