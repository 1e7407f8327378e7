use crate::error::{AppError, Result};
use crate::models::{fold_case, AttributeRow, OwnerIdentity, RowKey};
use crate::search::RowPredicate;
use crate::state::{retain_keys, AttributeStore, RowScope};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use uuid::Uuid;

/// Writes the row only if its current value equals the expected one
/// (empty string for absent), then indexes it.
/// KEYS: row, tenant index, owner type index, owner index.
/// ARGV: expected json, new json. Returns 1 when written.
static COMPARE_AND_SET: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        local current = redis.call('GET', KEYS[1]) or ''
        if current ~= ARGV[1] then
            return 0
        end
        redis.call('SET', KEYS[1], ARGV[2])
        redis.call('SADD', KEYS[2], KEYS[1])
        redis.call('SADD', KEYS[3], KEYS[1])
        redis.call('SADD', KEYS[4], KEYS[1])
        return 1
        "#,
    )
});

/// Removes one row and its index entries, returning the removed json.
/// KEYS: row, tenant index, owner type index, owner index.
static DELETE_ROW: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        local current = redis.call('GET', KEYS[1])
        if not current then
            return false
        end
        redis.call('DEL', KEYS[1])
        redis.call('SREM', KEYS[2], KEYS[1])
        redis.call('SREM', KEYS[3], KEYS[1])
        redis.call('SREM', KEYS[4], KEYS[1])
        return current
        "#,
    )
});

/// Removes every row of an owner and the owner index, returning the removed json.
/// KEYS: tenant index, owner type index, owner index.
static DELETE_OWNER: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        local removed = {}
        for _, row_key in ipairs(redis.call('SMEMBERS', KEYS[3])) do
            local current = redis.call('GET', row_key)
            if current then
                table.insert(removed, current)
                redis.call('DEL', row_key)
            end
            redis.call('SREM', KEYS[1], row_key)
            redis.call('SREM', KEYS[2], row_key)
        end
        redis.call('DEL', KEYS[3])
        return removed
        "#,
    )
});

/// Redis-based persistent attribute store.
///
/// Each row is a JSON string under its own key. Per-tenant, per-owner-type
/// and per-owner sets index the row keys; a counter key issues sequences.
/// Every write and its index updates run as one Lua script.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisStore {
    /// Create a new Redis store
    pub async fn new(redis_url: &str) -> Result<Self> {
        Self::new_with_prefix(redis_url, "metadata").await
    }

    /// Create a new Redis store with custom key prefix
    pub async fn new_with_prefix(redis_url: &str, prefix: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            AppError::Database(format!("Failed to create Redis client: {}", e))
        })?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Redis: {}", e)))?;

        // Test connection
        let mut test_conn = connection.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut test_conn)
            .await
            .map_err(|e| AppError::Database(format!("Redis connection test failed: {}", e)))?;

        tracing::info!("Initialized Redis store with prefix '{}'", prefix);

        Ok(Self {
            connection,
            key_prefix: prefix.to_string(),
        })
    }

    fn row_key(&self, key: &RowKey) -> String {
        format!(
            "{}:row:{}:{}:{}:{}",
            self.key_prefix, key.tenant_id, key.owner_type, key.owner_id, key.key_name
        )
    }

    fn tenant_index_key(&self, tenant_id: &Uuid) -> String {
        format!("{}:tenant:{}", self.key_prefix, tenant_id)
    }

    fn type_index_key(&self, tenant_id: &Uuid, owner_type: &str) -> String {
        format!("{}:type:{}:{}", self.key_prefix, tenant_id, fold_case(owner_type))
    }

    fn owner_index_key(&self, owner: &OwnerIdentity) -> String {
        format!(
            "{}:owner:{}:{}:{}",
            self.key_prefix,
            owner.tenant_id,
            owner.normalized_type(),
            owner.owner_id
        )
    }

    /// Index keys of an owner: tenant, owner type, owner
    fn index_keys(&self, owner: &OwnerIdentity) -> [String; 3] {
        [
            self.tenant_index_key(&owner.tenant_id),
            self.type_index_key(&owner.tenant_id, &owner.owner_type),
            self.owner_index_key(owner),
        ]
    }

    fn scope_index_key(&self, scope: &RowScope) -> String {
        match &scope.owner_type {
            Some(owner_type) => self.type_index_key(&scope.tenant_id, owner_type),
            None => self.tenant_index_key(&scope.tenant_id),
        }
    }

    fn sequence_key(&self) -> String {
        format!("{}:seq", self.key_prefix)
    }

    async fn next_seq(&self) -> Result<u64> {
        let mut conn = self.connection.clone();
        let seq: u64 = conn.incr(self.sequence_key(), 1u64).await?;
        Ok(seq)
    }

    /// Write `row` if the stored json still equals `expected` ("" for absent)
    async fn compare_and_set(&self, row_key: &str, row: &AttributeRow, expected: &str) -> Result<bool> {
        let [tenant_index, type_index, owner_index] = self.index_keys(&row.owner());
        let json = serde_json::to_string(row)?;

        let mut conn = self.connection.clone();
        let written: i64 = COMPARE_AND_SET
            .key(row_key)
            .key(tenant_index)
            .key(type_index)
            .key(owner_index)
            .arg(expected)
            .arg(json)
            .invoke_async(&mut conn)
            .await?;

        Ok(written == 1)
    }

    /// Fetch and decode rows by key, skipping keys that vanished since indexing
    async fn load_rows(&self, keys: &[String]) -> Result<Vec<AttributeRow>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.connection.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await?;

        let mut rows = values
            .into_iter()
            .flatten()
            .map(|json| serde_json::from_str::<AttributeRow>(&json).map_err(AppError::from))
            .collect::<Result<Vec<_>>>()?;

        rows.sort_by_key(|row| row.seq);
        Ok(rows)
    }

    async fn members(&self, set_key: &str) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();
        let members: Vec<String> = conn.smembers(set_key).await?;
        Ok(members)
    }
}

#[async_trait]
impl AttributeStore for RedisStore {
    async fn insert_row(&self, mut row: AttributeRow) -> Result<AttributeRow> {
        let row_key = self.row_key(&row.unique_key());
        row.seq = self.next_seq().await?;

        if !self.compare_and_set(&row_key, &row, "").await? {
            return Err(AppError::ConstraintViolation(format!(
                "key '{}' already exists for owner {}",
                row.key_name,
                row.owner()
            )));
        }

        tracing::debug!(owner = %row.owner(), key = %row.key_name, seq = row.seq, "Attribute inserted into Redis");
        Ok(row)
    }

    async fn upsert_row(&self, row: AttributeRow) -> Result<AttributeRow> {
        let row_key = self.row_key(&row.unique_key());

        // Retry until no other writer touched the row between read and write.
        loop {
            let mut conn = self.connection.clone();
            let existing: Option<String> = conn.get(&row_key).await?;

            let (written, expected) = match existing {
                Some(json) => (serde_json::from_str::<AttributeRow>(&json)?.replaced_by(&row), json),
                None => {
                    let fresh = AttributeRow {
                        seq: self.next_seq().await?,
                        ..row.clone()
                    };
                    (fresh, String::new())
                }
            };

            if self.compare_and_set(&row_key, &written, &expected).await? {
                tracing::debug!(owner = %written.owner(), key = %written.key_name, seq = written.seq, "Attribute upserted in Redis");
                return Ok(written);
            }

            tracing::debug!(key = %row_key, "Concurrent write detected, retrying upsert");
        }
    }

    async fn get_row(&self, owner: &OwnerIdentity, key_name: &str) -> Result<Option<AttributeRow>> {
        let mut conn = self.connection.clone();
        let json: Option<String> = conn.get(self.row_key(&RowKey::new(owner, key_name))).await?;

        json.map(|json| serde_json::from_str(&json).map_err(AppError::from))
            .transpose()
    }

    async fn find_rows(&self, scope: &RowScope, predicate: &RowPredicate) -> Result<Vec<AttributeRow>> {
        let keys = self.members(&self.scope_index_key(scope)).await?;
        let mut rows = self.load_rows(&keys).await?;
        rows.retain(|row| scope.contains(row) && predicate.matches(row));
        Ok(rows)
    }

    async fn find_rows_by_owner(
        &self,
        owner: &OwnerIdentity,
        key_names: Option<&[String]>,
    ) -> Result<Vec<AttributeRow>> {
        let keys = self.members(&self.owner_index_key(owner)).await?;
        let mut rows = self.load_rows(&keys).await?;
        retain_keys(&mut rows, key_names);
        Ok(rows)
    }

    async fn delete_row(&self, owner: &OwnerIdentity, key_name: &str) -> Result<Option<AttributeRow>> {
        let row_key = self.row_key(&RowKey::new(owner, key_name));
        let [tenant_index, type_index, owner_index] = self.index_keys(owner);

        let mut conn = self.connection.clone();
        let removed: Option<String> = DELETE_ROW
            .key(&row_key)
            .key(tenant_index)
            .key(type_index)
            .key(owner_index)
            .invoke_async(&mut conn)
            .await?;

        let Some(json) = removed else {
            return Ok(None);
        };

        tracing::debug!(owner = %owner, key = %key_name, "Attribute deleted from Redis");
        Ok(Some(serde_json::from_str(&json)?))
    }

    async fn delete_rows_by_owner(&self, owner: &OwnerIdentity) -> Result<Vec<AttributeRow>> {
        let [tenant_index, type_index, owner_index] = self.index_keys(owner);

        let mut conn = self.connection.clone();
        let removed: Vec<String> = DELETE_OWNER
            .key(tenant_index)
            .key(type_index)
            .key(owner_index)
            .invoke_async(&mut conn)
            .await?;

        let mut rows = removed
            .iter()
            .map(|json| serde_json::from_str::<AttributeRow>(json).map_err(AppError::from))
            .collect::<Result<Vec<_>>>()?;
        rows.sort_by_key(|row| row.seq);

        tracing::debug!(owner = %owner, count = rows.len(), "Owner attributes deleted from Redis");
        Ok(rows)
    }
}
