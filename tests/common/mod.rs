//! Shared fixtures for integration tests

#![allow(dead_code)]

use metadata_store::models::{AttributeRow, DataType, OwnerIdentity};
use metadata_store::state::AttributeStore;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

pub fn owner(tenant_id: Uuid, owner_type: &str) -> OwnerIdentity {
    OwnerIdentity::new(tenant_id, owner_type, Uuid::new_v4())
}

pub fn string_row(owner: &OwnerIdentity, key: &str, raw: &str) -> AttributeRow {
    AttributeRow::new(owner, key, DataType::String, Some(raw.to_string()))
}

pub fn typed_row(owner: &OwnerIdentity, key: &str, data_type: DataType, raw: &str) -> AttributeRow {
    AttributeRow::new(owner, key, data_type, Some(raw.to_string()))
}

/// Upsert one row per `(key, data type, raw)` triple for `owner`
pub async fn seed<S: AttributeStore + ?Sized>(
    store: &S,
    owner: &OwnerIdentity,
    attributes: &[(&str, DataType, &str)],
) {
    for (key, data_type, raw) in attributes {
        store
            .upsert_row(typed_row(owner, key, *data_type, raw))
            .await
            .unwrap();
    }
}

pub fn map(value: Value) -> BTreeMap<String, Value> {
    serde_json::from_value(value).unwrap()
}
