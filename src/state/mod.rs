pub mod store;
pub mod sled_store;
pub mod redis_store;
pub mod factory;

pub use store::*;
pub use sled_store::SledStore;
pub use redis_store::RedisStore;
pub use factory::{create_store, create_in_memory_store};

use crate::error::Result;
use crate::models::{names_match, AttributeRow, OwnerIdentity};
use crate::search::RowPredicate;
use async_trait::async_trait;
use uuid::Uuid;

/// Durable collection of attribute rows.
///
/// Implementations enforce uniqueness of `(tenant, owner type, owner id, key)`
/// with case-insensitive owner type and key comparison, assign a monotonically
/// increasing `seq` on first write, and return scans in `seq` order.
#[async_trait]
pub trait AttributeStore: Send + Sync {
    /// Insert a new row; fails with `ConstraintViolation` if the key already exists
    async fn insert_row(&self, row: AttributeRow) -> Result<AttributeRow>;

    /// Insert or replace the data type and value of an existing row
    async fn upsert_row(&self, row: AttributeRow) -> Result<AttributeRow>;

    /// Point lookup by owner and key
    async fn get_row(&self, owner: &OwnerIdentity, key_name: &str) -> Result<Option<AttributeRow>>;

    /// Rows inside `scope` accepted by `predicate`
    async fn find_rows(&self, scope: &RowScope, predicate: &RowPredicate) -> Result<Vec<AttributeRow>>;

    /// All rows of one owner, optionally restricted to a set of key names
    async fn find_rows_by_owner(
        &self,
        owner: &OwnerIdentity,
        key_names: Option<&[String]>,
    ) -> Result<Vec<AttributeRow>>;

    /// Delete one key of an owner, returning the removed row
    async fn delete_row(&self, owner: &OwnerIdentity, key_name: &str) -> Result<Option<AttributeRow>>;

    /// Delete every row of an owner, returning the removed rows
    async fn delete_rows_by_owner(&self, owner: &OwnerIdentity) -> Result<Vec<AttributeRow>>;
}

/// The `(tenant, owner type)` region every scan is bounded by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowScope {
    pub tenant_id: Uuid,
    pub owner_type: Option<String>,
}

impl RowScope {
    /// Every owner type of a tenant
    pub fn tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            owner_type: None,
        }
    }

    pub fn owner_type(tenant_id: Uuid, owner_type: impl Into<String>) -> Self {
        Self {
            tenant_id,
            owner_type: Some(owner_type.into()),
        }
    }

    pub fn contains(&self, row: &AttributeRow) -> bool {
        row.tenant_id == self.tenant_id
            && self
                .owner_type
                .as_deref()
                .map_or(true, |owner_type| names_match(&row.owner_type, owner_type))
    }
}

/// Keep only rows whose key is one of `key_names` (case-insensitive); `None` keeps all
pub(crate) fn retain_keys(rows: &mut Vec<AttributeRow>, key_names: Option<&[String]>) {
    if let Some(key_names) = key_names {
        rows.retain(|row| key_names.iter().any(|key| row.has_key(key)));
    }
}
