use super::{fold_case, names_match, OwnerIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;
use validator::Validate;

/// Maximum length of a key name
pub const KEY_NAME_LENGTH: usize = 255;

/// Maximum length of a raw value
pub const VALUE_LENGTH: usize = 767;

/// Declared type of a stored raw value
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum DataType {
    String,
    Boolean,
    Integer,
    Double,
    JsonObject,
    JsonArray,
    Null,
}

/// One entity-attribute-value fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AttributeRow {
    /// Store-assigned insertion sequence
    pub seq: u64,

    pub tenant_id: Uuid,

    #[validate(length(min = 1))]
    pub owner_type: String,

    pub owner_id: Uuid,

    #[validate(length(min = 1, max = 255))]
    pub key_name: String,

    pub data_type: DataType,

    #[validate(length(max = 767))]
    pub raw_value: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl AttributeRow {
    /// Create an unsaved row; the store assigns `seq` on first write
    pub fn new(
        owner: &OwnerIdentity,
        key_name: impl Into<String>,
        data_type: DataType,
        raw_value: Option<String>,
    ) -> Self {
        let now = Utc::now();

        Self {
            seq: 0,
            tenant_id: owner.tenant_id,
            owner_type: owner.owner_type.clone(),
            owner_id: owner.owner_id,
            key_name: key_name.into(),
            data_type,
            raw_value,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn owner(&self) -> OwnerIdentity {
        OwnerIdentity::new(self.tenant_id, self.owner_type.clone(), self.owner_id)
    }

    pub fn belongs_to(&self, owner: &OwnerIdentity) -> bool {
        self.tenant_id == owner.tenant_id
            && self.owner_id == owner.owner_id
            && names_match(&self.owner_type, &owner.owner_type)
    }

    pub fn has_key(&self, key_name: &str) -> bool {
        names_match(&self.key_name, key_name)
    }

    pub fn unique_key(&self) -> RowKey {
        RowKey::new(&self.owner(), &self.key_name)
    }

    /// Apply an upsert on top of this stored row.
    ///
    /// Identity, key casing, sequence and creation time are kept; type and value are replaced.
    pub fn replaced_by(&self, incoming: &AttributeRow) -> AttributeRow {
        AttributeRow {
            data_type: incoming.data_type,
            raw_value: incoming.raw_value.clone(),
            updated_at: incoming.updated_at,
            ..self.clone()
        }
    }
}

/// The `(tenant, owner type, owner id, key)` uniqueness key, case-folded
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub tenant_id: Uuid,
    pub owner_type: String,
    pub owner_id: Uuid,
    pub key_name: String,
}

impl RowKey {
    pub fn new(owner: &OwnerIdentity, key_name: &str) -> Self {
        Self {
            tenant_id: owner.tenant_id,
            owner_type: owner.normalized_type(),
            owner_id: owner.owner_id,
            key_name: fold_case(key_name),
        }
    }
}
