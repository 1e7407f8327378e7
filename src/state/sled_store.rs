use crate::error::{AppError, Result};
use crate::models::{fold_case, AttributeRow, OwnerIdentity};
use crate::search::RowPredicate;
use crate::state::{retain_keys, AttributeStore, RowScope};
use async_trait::async_trait;
use sled::Db;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Persistent attribute store using the Sled embedded database.
///
/// Rows live in a single tree keyed
/// `tenant | lower(owner type) | 0x00 | owner id | lower(key)` so every scope
/// (tenant, owner type, owner) is a key prefix.
#[derive(Clone)]
pub struct SledStore {
    db: Arc<Db>,
    rows_tree: sled::Tree,
}

impl SledStore {
    /// Create a new Sled store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref();
        let db = sled::open(&path).map_err(|e| {
            AppError::Database(format!("Failed to open Sled database: {}", e))
        })?;

        let rows_tree = db.open_tree("attribute_rows").map_err(|e| {
            AppError::Database(format!("Failed to open attribute rows tree: {}", e))
        })?;

        tracing::info!("Initialized Sled store at {:?}", path_str);

        Ok(Self {
            db: Arc::new(db),
            rows_tree,
        })
    }

    /// Serialize row to bytes
    fn serialize_row(row: &AttributeRow) -> Result<Vec<u8>> {
        bincode::serialize(row).map_err(|e| {
            AppError::Serialization(format!("Failed to serialize attribute row: {}", e))
        })
    }

    /// Deserialize row from bytes
    fn deserialize_row(bytes: &[u8]) -> Result<AttributeRow> {
        bincode::deserialize(bytes).map_err(|e| {
            AppError::Serialization(format!("Failed to deserialize attribute row: {}", e))
        })
    }

    fn tenant_prefix(tenant_id: &Uuid) -> Vec<u8> {
        tenant_id.as_bytes().to_vec()
    }

    fn owner_type_prefix(tenant_id: &Uuid, owner_type: &str) -> Vec<u8> {
        let mut key = Self::tenant_prefix(tenant_id);
        key.extend_from_slice(fold_case(owner_type).as_bytes());
        key.push(0);
        key
    }

    fn owner_prefix(owner: &OwnerIdentity) -> Vec<u8> {
        let mut key = Self::owner_type_prefix(&owner.tenant_id, &owner.owner_type);
        key.extend_from_slice(owner.owner_id.as_bytes());
        key
    }

    fn row_key(owner: &OwnerIdentity, key_name: &str) -> Vec<u8> {
        let mut key = Self::owner_prefix(owner);
        key.extend_from_slice(fold_case(key_name).as_bytes());
        key
    }

    fn scope_prefix(scope: &RowScope) -> Vec<u8> {
        match &scope.owner_type {
            Some(owner_type) => Self::owner_type_prefix(&scope.tenant_id, owner_type),
            None => Self::tenant_prefix(&scope.tenant_id),
        }
    }

    /// Decode every row under a key prefix, in storage order
    fn scan(&self, prefix: &[u8]) -> Result<Vec<AttributeRow>> {
        let mut rows = Vec::new();

        for result in self.rows_tree.scan_prefix(prefix) {
            let (_, value) = result.map_err(|e| {
                AppError::Database(format!("Failed to iterate attribute rows: {}", e))
            })?;
            rows.push(Self::deserialize_row(&value)?);
        }

        rows.sort_by_key(|row| row.seq);
        Ok(rows)
    }

    fn flush_rows(&self) -> Result<()> {
        self.rows_tree.flush().map_err(|e| {
            AppError::Database(format!("Failed to flush attribute rows tree: {}", e))
        })?;
        Ok(())
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await.map_err(|e| {
            AppError::Database(format!("Failed to flush database: {}", e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl AttributeStore for SledStore {
    async fn insert_row(&self, mut row: AttributeRow) -> Result<AttributeRow> {
        let key = Self::row_key(&row.owner(), &row.key_name);
        row.seq = self.db.generate_id()?;
        let value = Self::serialize_row(&row)?;

        let swapped = self
            .rows_tree
            .compare_and_swap(&key, None::<&[u8]>, Some(value))
            .map_err(|e| AppError::Database(format!("Failed to insert attribute row: {}", e)))?;

        if swapped.is_err() {
            return Err(AppError::ConstraintViolation(format!(
                "key '{}' already exists for owner {}",
                row.key_name,
                row.owner()
            )));
        }

        self.flush_rows()?;

        tracing::debug!(owner = %row.owner(), key = %row.key_name, seq = row.seq, "Attribute inserted into Sled");
        Ok(row)
    }

    async fn upsert_row(&self, row: AttributeRow) -> Result<AttributeRow> {
        let key = Self::row_key(&row.owner(), &row.key_name);
        let fresh_seq = self.db.generate_id()?;

        let mut written: Option<AttributeRow> = None;
        let mut failure: Option<AppError> = None;

        // The closure may run more than once under contention; only the last run counts.
        self.rows_tree
            .update_and_fetch(&key, |existing| {
                failure = None;

                let next = match existing.map(Self::deserialize_row).transpose() {
                    Ok(Some(stored)) => stored.replaced_by(&row),
                    Ok(None) => AttributeRow {
                        seq: fresh_seq,
                        ..row.clone()
                    },
                    Err(e) => {
                        failure = Some(e);
                        return existing.map(<[u8]>::to_vec);
                    }
                };

                match Self::serialize_row(&next) {
                    Ok(bytes) => {
                        written = Some(next);
                        Some(bytes)
                    }
                    Err(e) => {
                        failure = Some(e);
                        existing.map(<[u8]>::to_vec)
                    }
                }
            })
            .map_err(|e| AppError::Database(format!("Failed to upsert attribute row: {}", e)))?;

        if let Some(e) = failure {
            return Err(e);
        }

        self.flush_rows()?;

        let written = written
            .ok_or_else(|| AppError::Internal("Upsert produced no row".to_string()))?;

        tracing::debug!(owner = %written.owner(), key = %written.key_name, seq = written.seq, "Attribute upserted in Sled");
        Ok(written)
    }

    async fn get_row(&self, owner: &OwnerIdentity, key_name: &str) -> Result<Option<AttributeRow>> {
        let key = Self::row_key(owner, key_name);

        match self.rows_tree.get(&key) {
            Ok(Some(bytes)) => Ok(Some(Self::deserialize_row(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(AppError::Database(format!(
                "Failed to get attribute row: {}",
                e
            ))),
        }
    }

    async fn find_rows(&self, scope: &RowScope, predicate: &RowPredicate) -> Result<Vec<AttributeRow>> {
        let mut rows = self.scan(&Self::scope_prefix(scope))?;
        rows.retain(|row| predicate.matches(row));
        Ok(rows)
    }

    async fn find_rows_by_owner(
        &self,
        owner: &OwnerIdentity,
        key_names: Option<&[String]>,
    ) -> Result<Vec<AttributeRow>> {
        let mut rows = self.scan(&Self::owner_prefix(owner))?;
        retain_keys(&mut rows, key_names);
        Ok(rows)
    }

    async fn delete_row(&self, owner: &OwnerIdentity, key_name: &str) -> Result<Option<AttributeRow>> {
        let key = Self::row_key(owner, key_name);

        let removed = self.rows_tree.remove(&key).map_err(|e| {
            AppError::Database(format!("Failed to delete attribute row: {}", e))
        })?;

        let Some(bytes) = removed else {
            return Ok(None);
        };

        self.flush_rows()?;

        tracing::debug!(owner = %owner, key = %key_name, "Attribute deleted from Sled");
        Ok(Some(Self::deserialize_row(&bytes)?))
    }

    async fn delete_rows_by_owner(&self, owner: &OwnerIdentity) -> Result<Vec<AttributeRow>> {
        let mut removed = Vec::new();

        for result in self.rows_tree.scan_prefix(Self::owner_prefix(owner)) {
            let (key, _) = result.map_err(|e| {
                AppError::Database(format!("Failed to iterate attribute rows: {}", e))
            })?;

            if let Some(bytes) = self.rows_tree.remove(&key).map_err(|e| {
                AppError::Database(format!("Failed to delete attribute row: {}", e))
            })? {
                removed.push(Self::deserialize_row(&bytes)?);
            }
        }

        self.flush_rows()?;

        removed.sort_by_key(|row| row.seq);
        tracing::debug!(owner = %owner, count = removed.len(), "Owner attributes deleted from Sled");
        Ok(removed)
    }
}
