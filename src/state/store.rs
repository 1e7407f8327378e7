use crate::error::{AppError, Result};
use crate::models::{AttributeRow, OwnerIdentity, RowKey};
use crate::search::RowPredicate;
use crate::state::{retain_keys, AttributeStore, RowScope};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// In-memory attribute store (for development and testing)
#[derive(Clone)]
pub struct InMemoryStore {
    rows: Arc<DashMap<RowKey, AttributeRow>>,
    sequence: Arc<AtomicU64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(DashMap::new()),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn sorted(mut rows: Vec<AttributeRow>) -> Vec<AttributeRow> {
        rows.sort_by_key(|row| row.seq);
        rows
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttributeStore for InMemoryStore {
    async fn insert_row(&self, mut row: AttributeRow) -> Result<AttributeRow> {
        match self.rows.entry(row.unique_key()) {
            Entry::Occupied(_) => Err(AppError::ConstraintViolation(format!(
                "key '{}' already exists for owner {}",
                row.key_name,
                row.owner()
            ))),
            Entry::Vacant(slot) => {
                row.seq = self.next_seq();
                slot.insert(row.clone());
                tracing::debug!(owner = %row.owner(), key = %row.key_name, seq = row.seq, "Attribute inserted");
                Ok(row)
            }
        }
    }

    async fn upsert_row(&self, mut row: AttributeRow) -> Result<AttributeRow> {
        let written = match self.rows.entry(row.unique_key()) {
            Entry::Occupied(mut slot) => {
                let merged = slot.get().replaced_by(&row);
                slot.insert(merged.clone());
                merged
            }
            Entry::Vacant(slot) => {
                row.seq = self.next_seq();
                slot.insert(row.clone());
                row
            }
        };

        tracing::debug!(owner = %written.owner(), key = %written.key_name, seq = written.seq, "Attribute upserted");
        Ok(written)
    }

    async fn get_row(&self, owner: &OwnerIdentity, key_name: &str) -> Result<Option<AttributeRow>> {
        Ok(self
            .rows
            .get(&RowKey::new(owner, key_name))
            .map(|entry| entry.clone()))
    }

    async fn find_rows(&self, scope: &RowScope, predicate: &RowPredicate) -> Result<Vec<AttributeRow>> {
        let rows = self
            .rows
            .iter()
            .filter(|entry| scope.contains(entry.value()) && predicate.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        Ok(Self::sorted(rows))
    }

    async fn find_rows_by_owner(
        &self,
        owner: &OwnerIdentity,
        key_names: Option<&[String]>,
    ) -> Result<Vec<AttributeRow>> {
        let mut rows: Vec<AttributeRow> = self
            .rows
            .iter()
            .filter(|entry| entry.value().belongs_to(owner))
            .map(|entry| entry.value().clone())
            .collect();

        retain_keys(&mut rows, key_names);
        Ok(Self::sorted(rows))
    }

    async fn delete_row(&self, owner: &OwnerIdentity, key_name: &str) -> Result<Option<AttributeRow>> {
        let removed = self.rows.remove(&RowKey::new(owner, key_name)).map(|(_, row)| row);

        if removed.is_some() {
            tracing::debug!(owner = %owner, key = %key_name, "Attribute deleted");
        }
        Ok(removed)
    }

    async fn delete_rows_by_owner(&self, owner: &OwnerIdentity) -> Result<Vec<AttributeRow>> {
        let keys: Vec<RowKey> = self
            .rows
            .iter()
            .filter(|entry| entry.value().belongs_to(owner))
            .map(|entry| entry.key().clone())
            .collect();

        let removed: Vec<AttributeRow> = keys
            .iter()
            .filter_map(|key| self.rows.remove(key).map(|(_, row)| row))
            .collect();

        tracing::debug!(owner = %owner, count = removed.len(), "Owner attributes deleted");
        Ok(Self::sorted(removed))
    }
}
