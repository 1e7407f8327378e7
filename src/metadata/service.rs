//! URN-facing metadata operations
//!
//! Writes reject malformed tenant or owner references with
//! `InvalidIdentifier`; reads and deletes degrade to an empty result instead.

use crate::codec;
use crate::config::SearchConfig;
use crate::error::{AppError, Result};
use crate::models::urn::{parse_owner_urn, parse_tenant_urn};
use crate::models::{
    AttributeRow, MatchedAttribute, MetadataResponse, MetadataSingleResponse, OwnerIdentity,
    OwnerMatch, RowKey,
};
use crate::search::{ConstraintGroup, Page, PageRequest, RowPredicate, SearchEngine};
use crate::state::{AttributeStore, RowScope};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use validator::Validate;

/// Metadata persistence and search for one store
#[derive(Clone)]
pub struct MetadataService {
    store: Arc<dyn AttributeStore>,
    engine: SearchEngine,
}

impl MetadataService {
    pub fn new(store: Arc<dyn AttributeStore>, config: SearchConfig) -> Self {
        let engine = SearchEngine::new(store.clone(), config);
        Self { store, engine }
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    /// Create every entry of `metadata`; fails without writing if any key already exists
    pub async fn create(
        &self,
        tenant_urn: &str,
        owner_type: &str,
        owner_urn: &str,
        metadata: &BTreeMap<String, Value>,
    ) -> Result<Option<MetadataResponse>> {
        if metadata.is_empty() {
            return Ok(None);
        }

        let owner = resolve_owner(tenant_urn, owner_type, owner_urn)?;
        let rows = build_rows(&owner, metadata)?;

        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            if !seen.insert(RowKey::new(&owner, &row.key_name)) {
                return Err(AppError::ConstraintViolation(format!(
                    "key '{}' appears more than once for owner {}",
                    row.key_name, owner
                )));
            }
        }

        for row in &rows {
            if self.store.get_row(&owner, &row.key_name).await?.is_some() {
                return Err(AppError::ConstraintViolation(format!(
                    "key '{}' already exists for owner {}",
                    row.key_name, owner
                )));
            }
        }

        let mut written = Vec::with_capacity(rows.len());
        for row in rows {
            match self.store.insert_row(row).await {
                Ok(stored) => written.push(stored),
                Err(e) => {
                    self.roll_back(&owner, &written).await;
                    return Err(e);
                }
            }
        }

        tracing::info!(owner = %owner, keys = written.len(), "Metadata created");
        Ok(Some(MetadataResponse::from_rows(&owner, &written)))
    }

    /// Remove rows written by a create that failed part way
    async fn roll_back(&self, owner: &OwnerIdentity, written: &[AttributeRow]) {
        for row in written {
            if let Err(e) = self.store.delete_row(owner, &row.key_name).await {
                tracing::warn!(
                    owner = %owner,
                    key = %row.key_name,
                    error = %e,
                    "Failed to roll back created key"
                );
            }
        }
    }

    /// Insert or replace every entry of `metadata`
    pub async fn upsert(
        &self,
        tenant_urn: &str,
        owner_type: &str,
        owner_urn: &str,
        metadata: &BTreeMap<String, Value>,
    ) -> Result<Option<MetadataResponse>> {
        if metadata.is_empty() {
            return Ok(None);
        }

        let owner = resolve_owner(tenant_urn, owner_type, owner_urn)?;
        let rows = build_rows(&owner, metadata)?;

        let mut written = Vec::with_capacity(rows.len());
        for row in rows {
            written.push(self.store.upsert_row(row).await?);
        }

        tracing::info!(owner = %owner, keys = written.len(), "Metadata upserted");
        Ok(Some(MetadataResponse::from_rows(&owner, &written)))
    }

    /// Replace the value of an existing key; `None` when the key is absent
    pub async fn update(
        &self,
        tenant_urn: &str,
        owner_type: &str,
        owner_urn: &str,
        key: &str,
        value: &Value,
    ) -> Result<Option<MetadataResponse>> {
        let owner = resolve_owner(tenant_urn, owner_type, owner_urn)?;

        if self.store.get_row(&owner, key).await?.is_none() {
            tracing::debug!(owner = %owner, key = %key, "Update of missing key ignored");
            return Ok(None);
        }

        let (data_type, raw_value) = codec::classify(value);
        let row = AttributeRow::new(&owner, key, data_type, raw_value);
        row.validate()?;

        let written = self.store.upsert_row(row).await?;
        Ok(Some(MetadataResponse::from_row(&written)))
    }

    /// Delete one key, returning one response per removed row
    pub async fn delete(
        &self,
        tenant_urn: &str,
        owner_type: &str,
        owner_urn: &str,
        key: &str,
    ) -> Result<Vec<MetadataResponse>> {
        let owner = match resolve_owner(tenant_urn, owner_type, owner_urn) {
            Ok(owner) => owner,
            Err(err) => return degraded("delete", err),
        };

        let removed = self.store.delete_row(&owner, key).await?;
        Ok(removed.iter().map(MetadataResponse::from_row).collect())
    }

    /// Delete every key of an owner, returning one response per removed row
    pub async fn delete_all_by_owner(
        &self,
        tenant_urn: &str,
        owner_type: &str,
        owner_urn: &str,
    ) -> Result<Vec<MetadataResponse>> {
        let owner = match resolve_owner(tenant_urn, owner_type, owner_urn) {
            Ok(owner) => owner,
            Err(err) => return degraded("delete_all_by_owner", err),
        };

        let removed = self.store.delete_rows_by_owner(&owner).await?;
        tracing::info!(owner = %owner, count = removed.len(), "Owner metadata deleted");
        Ok(removed.iter().map(MetadataResponse::from_row).collect())
    }

    /// Native value stored under `key`
    pub async fn find_by_key(
        &self,
        tenant_urn: &str,
        owner_type: &str,
        owner_urn: &str,
        key: &str,
    ) -> Result<Option<Value>> {
        let owner = match resolve_owner(tenant_urn, owner_type, owner_urn) {
            Ok(owner) => owner,
            Err(err) => return degraded("find_by_key", err),
        };

        let row = self.store.get_row(&owner, key).await?;
        Ok(row.map(|row| MatchedAttribute::from(&row).value))
    }

    /// Attributes of one owner, restricted to `keys` unless it is empty
    pub async fn find_by_owner(
        &self,
        tenant_urn: &str,
        owner_type: &str,
        owner_urn: &str,
        keys: &[String],
    ) -> Result<Option<MetadataResponse>> {
        let owner = match resolve_owner(tenant_urn, owner_type, owner_urn) {
            Ok(owner) => owner,
            Err(err) => return degraded("find_by_owner", err),
        };

        let filter = (!keys.is_empty()).then_some(keys);
        let rows = self.store.find_rows_by_owner(&owner, filter).await?;
        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(MetadataResponse::from_rows(&owner, &rows)))
    }

    /// Every attribute row of a tenant, in storage order
    pub async fn find_all(
        &self,
        tenant_urn: &str,
        page: u32,
        size: u32,
    ) -> Result<Page<MetadataSingleResponse>> {
        let tenant_id = match parse_tenant_urn(tenant_urn) {
            Ok(tenant_id) => tenant_id,
            Err(err) => return degraded("find_all", err),
        };

        let request = PageRequest::new(page, size).clamped(self.engine.config().max_page_size);
        let rows = self
            .store
            .find_rows(&RowScope::tenant(tenant_id), &RowPredicate::any())
            .await?;

        Ok(Page::slice(rows, request.page, request.size).map(|row| MetadataSingleResponse::from(&row)))
    }

    /// Owners satisfying every group, optionally restricted to one owner type
    pub async fn search(
        &self,
        tenant_urn: &str,
        owner_type: Option<&str>,
        groups: &[ConstraintGroup],
        request: &PageRequest,
    ) -> Result<Page<OwnerMatch>> {
        let scope = match resolve_scope(tenant_urn, owner_type) {
            Ok(scope) => scope,
            Err(err) => return degraded("search", err),
        };

        self.engine.search(&scope, groups, request).await
    }

    pub async fn count(
        &self,
        tenant_urn: &str,
        owner_type: Option<&str>,
        groups: &[ConstraintGroup],
    ) -> Result<u64> {
        let scope = match resolve_scope(tenant_urn, owner_type) {
            Ok(scope) => scope,
            Err(err) => return degraded("count", err),
        };

        self.engine.count(&scope, groups).await
    }

    /// Owners of the tenant holding every key/value pair; an empty map lists all owners
    pub async fn find_owners_by_key_value_pairs(
        &self,
        tenant_urn: &str,
        pairs: &BTreeMap<String, Value>,
        request: &PageRequest,
    ) -> Result<Page<OwnerMatch>> {
        let tenant_id = match parse_tenant_urn(tenant_urn) {
            Ok(tenant_id) => tenant_id,
            Err(err) => return degraded("find_owners_by_key_value_pairs", err),
        };

        self.engine
            .find_owners_by_attribute_map(tenant_id, pairs, request)
            .await
    }
}

fn resolve_owner(tenant_urn: &str, owner_type: &str, owner_urn: &str) -> Result<OwnerIdentity> {
    let tenant_id = parse_tenant_urn(tenant_urn)?;
    let owner_id = parse_owner_urn(owner_urn)?;
    Ok(OwnerIdentity::new(tenant_id, owner_type, owner_id))
}

fn resolve_scope(tenant_urn: &str, owner_type: Option<&str>) -> Result<RowScope> {
    let tenant_id = parse_tenant_urn(tenant_urn)?;
    Ok(match owner_type {
        Some(owner_type) => RowScope::owner_type(tenant_id, owner_type),
        None => RowScope::tenant(tenant_id),
    })
}

fn build_rows(owner: &OwnerIdentity, metadata: &BTreeMap<String, Value>) -> Result<Vec<AttributeRow>> {
    metadata
        .iter()
        .map(|(key, value)| -> Result<AttributeRow> {
            let (data_type, raw_value) = codec::classify(value);
            let row = AttributeRow::new(owner, key.as_str(), data_type, raw_value);
            row.validate()?;
            Ok(row)
        })
        .collect()
}

/// Malformed identifiers become an empty result; anything else propagates
fn degraded<T: Default>(operation: &'static str, err: AppError) -> Result<T> {
    if err.is_invalid_identifier() {
        tracing::warn!(operation, error = %err, "Malformed identifier, returning empty result");
        Ok(T::default())
    } else {
        Err(err)
    }
}
