use super::{AttributeRow, DataType, OwnerIdentity};
use crate::codec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// All requested attributes of one owner, rendered to native values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResponse {
    pub owner_type: String,
    pub owner_urn: String,
    pub metadata: BTreeMap<String, Value>,
}

impl MetadataResponse {
    /// Build a response for `owner`; undecodable values fall back to their raw string
    pub fn from_rows(owner: &OwnerIdentity, rows: &[AttributeRow]) -> Self {
        let metadata = rows
            .iter()
            .map(|row| (row.key_name.clone(), render_row(row).0))
            .collect();

        Self {
            owner_type: owner.owner_type.clone(),
            owner_urn: owner.owner_urn(),
            metadata,
        }
    }

    pub fn from_row(row: &AttributeRow) -> Self {
        Self::from_rows(&row.owner(), std::slice::from_ref(row))
    }
}

/// A single attribute row, as listed by tenant-wide paging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataSingleResponse {
    pub owner_type: String,
    pub owner_urn: String,
    pub key: String,
    pub data_type: DataType,
    pub value: Value,
}

impl From<&AttributeRow> for MetadataSingleResponse {
    fn from(row: &AttributeRow) -> Self {
        Self {
            owner_type: row.owner_type.clone(),
            owner_urn: row.owner().owner_urn(),
            key: row.key_name.clone(),
            data_type: row.data_type,
            value: render_row(row).0,
        }
    }
}

/// An attribute that justified an owner's membership in a search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedAttribute {
    pub key_name: String,
    pub data_type: DataType,
    pub value: Value,

    /// Set when the stored raw value could not be decoded and `value` holds the raw string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<String>,
}

impl From<&AttributeRow> for MatchedAttribute {
    fn from(row: &AttributeRow) -> Self {
        let (value, decode_error) = render_row(row);

        Self {
            key_name: row.key_name.clone(),
            data_type: row.data_type,
            value,
            decode_error,
        }
    }
}

/// One owner found by a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerMatch {
    #[serde(flatten)]
    pub owner: OwnerIdentity,
    pub owner_urn: String,
    pub attributes: Vec<MatchedAttribute>,
}

impl OwnerMatch {
    pub fn new(owner: &OwnerIdentity, rows: &[AttributeRow]) -> Self {
        Self {
            owner: owner.clone(),
            owner_urn: owner.owner_urn(),
            attributes: rows.iter().map(MatchedAttribute::from).collect(),
        }
    }

    pub fn owner_type(&self) -> &str {
        &self.owner.owner_type
    }
}

fn render_row(row: &AttributeRow) -> (Value, Option<String>) {
    let (value, err) = codec::render_lossy(row.data_type, row.raw_value.as_deref());

    match err {
        Some(err) => {
            tracing::warn!(
                tenant_id = %row.tenant_id,
                owner_type = %row.owner_type,
                owner_id = %row.owner_id,
                key = %row.key_name,
                error = %err,
                "Stored value could not be decoded, returning raw string"
            );
            (value, Some(err.to_string()))
        }
        None => (value, None),
    }
}
