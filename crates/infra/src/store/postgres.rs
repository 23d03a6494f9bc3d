//! Postgres-backed tenant-scoped storage.
//!
//! Each entity table shares one layout so a single generic implementation
//! serves every entity type:
//!
//! | column | type | notes |
//! |---|---|---|
//! | `id` | `UUID PRIMARY KEY` | |
//! | `tenant_id` | `UUID NOT NULL` | every query filters on it |
//! | `unique_key` | `TEXT NULL` | `UNIQUE (tenant_id, unique_key)`; NULL for unkeyed entities |
//! | `is_system` | `BOOLEAN NOT NULL` | |
//! | `sort_order` | `INTEGER NULL` | |
//! | `sort_name` | `TEXT NOT NULL` | |
//! | `created_at`, `updated_at` | `TIMESTAMPTZ NOT NULL` | |
//! | `body` | `JSONB NOT NULL` | the serialized entity |
//!
//! Join tables carry `tenant_id` plus one column per endpoint.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | anything else | | `Backend` |

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use docvault_core::{EntityId, ScopedEntity, TenantId};

use super::{
    AssociationStore, AssociationTable, LinkOutcome, RemoveOutcome, ScopedStore, StoreError,
    TableSpec,
};

/// Connection pool shared by every Postgres store and join table.
#[derive(Debug, Clone)]
pub struct PostgresDatabase {
    pool: Arc<PgPool>,
}

impl PostgresDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Run idempotent DDL statements (`CREATE TABLE IF NOT EXISTS ...`) in order.
    pub async fn apply_schema(&self, statements: &[&str]) -> Result<(), StoreError> {
        for statement in statements {
            sqlx::query(*statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("apply_schema", e))?;
        }
        Ok(())
    }

    pub fn store<E: ScopedEntity>(&self, spec: TableSpec) -> PostgresScopedStore<E> {
        PostgresScopedStore {
            pool: self.pool.clone(),
            spec,
            _entity: PhantomData,
        }
    }
}

/// Postgres table for one entity type.
///
/// Every query includes `tenant_id` in the WHERE clause; uniqueness is
/// enforced by the `(tenant_id, unique_key)` index so two concurrent creates
/// cannot both succeed.
pub struct PostgresScopedStore<E> {
    pool: Arc<PgPool>,
    spec: TableSpec,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for PostgresScopedStore<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            spec: self.spec,
            _entity: PhantomData,
        }
    }
}

impl<E> PostgresScopedStore<E>
where
    E: ScopedEntity + Serialize + DeserializeOwned,
{
    fn decode_row(row: &PgRow) -> Result<E, StoreError> {
        let body: serde_json::Value = row
            .try_get("body")
            .map_err(|e| map_sqlx_error("decode_row", e))?;
        serde_json::from_value(body)
            .map_err(|e| StoreError::Backend(format!("failed to deserialize {} row: {e}", E::KIND)))
    }

    fn encode_body(entity: &E) -> Result<serde_json::Value, StoreError> {
        serde_json::to_value(entity)
            .map_err(|e| StoreError::Backend(format!("failed to serialize {}: {e}", E::KIND)))
    }

    /// Join tables referencing this entity, with the referencing column.
    fn join_columns(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.spec
            .associations
            .iter()
            .filter_map(|a| a.column_for(E::KIND).map(|col| (a.name, col)))
    }
}

#[async_trait]
impl<E> ScopedStore<E> for PostgresScopedStore<E>
where
    E: ScopedEntity + Serialize + DeserializeOwned,
{
    #[instrument(skip(self, entity), fields(table = self.spec.table, tenant_id = %entity.tenant_id()), err)]
    async fn insert(&self, entity: E) -> Result<E, StoreError> {
        let sql = format!(
            "INSERT INTO {} (id, tenant_id, unique_key, is_system, sort_order, sort_name, created_at, updated_at, body) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            self.spec.table
        );
        let scope = entity.scope();
        sqlx::query(&sql)
            .bind(scope.id.as_uuid())
            .bind(scope.tenant_id.as_uuid())
            .bind(entity.unique_key())
            .bind(scope.is_system)
            .bind(entity.sort_order())
            .bind(entity.sort_name())
            .bind(scope.created_at)
            .bind(scope.updated_at)
            .bind(Self::encode_body(&entity)?)
            .execute(&*self.pool)
            .await
            .map_err(|e| conflict_or(e, entity.unique_key(), "insert"))?;
        Ok(entity)
    }

    #[instrument(skip(self), fields(table = self.spec.table), err)]
    async fn find(&self, tenant_id: TenantId, id: EntityId) -> Result<Option<E>, StoreError> {
        let sql = format!(
            "SELECT body FROM {} WHERE tenant_id = $1 AND id = $2",
            self.spec.table
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find", e))?;
        row.as_ref().map(Self::decode_row).transpose()
    }

    #[instrument(skip(self), fields(table = self.spec.table), err)]
    async fn find_by_key(&self, tenant_id: TenantId, key: &str) -> Result<Option<E>, StoreError> {
        let sql = format!(
            "SELECT body FROM {} WHERE tenant_id = $1 AND unique_key = $2",
            self.spec.table
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(key)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_key", e))?;
        row.as_ref().map(Self::decode_row).transpose()
    }

    #[instrument(skip(self, entity), fields(table = self.spec.table, tenant_id = %entity.tenant_id()), err)]
    async fn replace(&self, entity: E) -> Result<Option<E>, StoreError> {
        let sql = format!(
            "UPDATE {} SET unique_key = $3, sort_order = $4, sort_name = $5, updated_at = $6, body = $7 \
             WHERE tenant_id = $1 AND id = $2",
            self.spec.table
        );
        let result = sqlx::query(&sql)
            .bind(entity.tenant_id().as_uuid())
            .bind(entity.id().as_uuid())
            .bind(entity.unique_key())
            .bind(entity.sort_order())
            .bind(entity.sort_name())
            .bind(entity.scope().updated_at)
            .bind(Self::encode_body(&entity)?)
            .execute(&*self.pool)
            .await
            .map_err(|e| conflict_or(e, entity.unique_key(), "replace"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(entity))
    }

    #[instrument(skip(self), fields(table = self.spec.table), err)]
    async fn remove_cascade(&self, tenant_id: TenantId, id: EntityId) -> Result<RemoveOutcome, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Row lock: a concurrent delete or link waits for this transaction.
        let sql = format!(
            "SELECT is_system FROM {} WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
            self.spec.table
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_row", e))?;

        let outcome = match row {
            None => RemoveOutcome::NotFound,
            Some(row) => {
                let is_system: bool = row
                    .try_get("is_system")
                    .map_err(|e| map_sqlx_error("lock_row", e))?;
                if is_system {
                    RemoveOutcome::Protected
                } else {
                    let mut associations = 0;
                    for (join_table, column) in self.join_columns() {
                        let sql = format!("DELETE FROM {join_table} WHERE tenant_id = $1 AND {column} = $2");
                        let deleted = sqlx::query(&sql)
                            .bind(tenant_id.as_uuid())
                            .bind(id.as_uuid())
                            .execute(&mut *tx)
                            .await
                            .map_err(|e| map_sqlx_error("delete_associations", e))?;
                        associations += deleted.rows_affected();
                    }

                    let sql = format!("DELETE FROM {} WHERE tenant_id = $1 AND id = $2", self.spec.table);
                    sqlx::query(&sql)
                        .bind(tenant_id.as_uuid())
                        .bind(id.as_uuid())
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| map_sqlx_error("delete_row", e))?;

                    RemoveOutcome::Removed { associations }
                }
            }
        };

        match outcome {
            RemoveOutcome::Removed { .. } => tx
                .commit()
                .await
                .map_err(|e| map_sqlx_error("commit_transaction", e))?,
            _ => tx
                .rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?,
        }
        Ok(outcome)
    }

    #[instrument(skip(self), fields(table = self.spec.table), err)]
    async fn list(&self, tenant_id: TenantId) -> Result<Vec<E>, StoreError> {
        let sql = format!("SELECT body FROM {} WHERE tenant_id = $1", self.spec.table);
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list", e))?;
        rows.iter().map(Self::decode_row).collect()
    }

    #[instrument(skip(self), fields(table = self.spec.table), err)]
    async fn count_related(&self, tenant_id: TenantId, id: EntityId) -> Result<u64, StoreError> {
        let mut total = 0u64;
        for (join_table, column) in self.join_columns() {
            let sql = format!("SELECT COUNT(*) AS n FROM {join_table} WHERE tenant_id = $1 AND {column} = $2");
            let row = sqlx::query(&sql)
                .bind(tenant_id.as_uuid())
                .bind(id.as_uuid())
                .fetch_one(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("count_related", e))?;
            let n: i64 = row.try_get("n").map_err(|e| map_sqlx_error("count_related", e))?;
            total += n.max(0) as u64;
        }
        Ok(total)
    }
}

#[async_trait]
impl AssociationStore for PostgresDatabase {
    #[instrument(skip(self, table), fields(join_table = table.name), err)]
    async fn link(
        &self,
        table: &AssociationTable,
        tenant_id: TenantId,
        left: EntityId,
        right: EntityId,
    ) -> Result<LinkOutcome, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // FOR SHARE keeps both endpoints alive until the join row is written.
        for (endpoint_table, id) in [(table.left.table, left), (table.right.table, right)] {
            let sql = format!("SELECT 1 FROM {endpoint_table} WHERE tenant_id = $1 AND id = $2 FOR SHARE");
            let found = sqlx::query(&sql)
                .bind(tenant_id.as_uuid())
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("lock_endpoint", e))?;
            if found.is_none() {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Ok(LinkOutcome::MissingEndpoint);
            }
        }

        let sql = format!(
            "INSERT INTO {} (tenant_id, {}, {}) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            table.name, table.left.column, table.right.column
        );
        let inserted = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(left.as_uuid())
            .bind(right.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_link", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(if inserted.rows_affected() == 0 {
            LinkOutcome::AlreadyLinked
        } else {
            LinkOutcome::Linked
        })
    }

    #[instrument(skip(self, table), fields(join_table = table.name), err)]
    async fn unlink(
        &self,
        table: &AssociationTable,
        tenant_id: TenantId,
        left: EntityId,
        right: EntityId,
    ) -> Result<bool, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE tenant_id = $1 AND {} = $2 AND {} = $3",
            table.name, table.left.column, table.right.column
        );
        let deleted = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(left.as_uuid())
            .bind(right.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("unlink", e))?;
        Ok(deleted.rows_affected() > 0)
    }

    #[instrument(skip(self, table), fields(join_table = table.name), err)]
    async fn linked(
        &self,
        table: &AssociationTable,
        tenant_id: TenantId,
        left: EntityId,
    ) -> Result<Vec<EntityId>, StoreError> {
        let sql = format!(
            "SELECT {right} AS related FROM {name} WHERE tenant_id = $1 AND {left} = $2 ORDER BY {right}",
            right = table.right.column,
            name = table.name,
            left = table.left.column,
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(left.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("linked", e))?;
        rows.iter()
            .map(|r| {
                r.try_get::<Uuid, _>("related")
                    .map(EntityId::from_uuid)
                    .map_err(|e| map_sqlx_error("linked", e))
            })
            .collect()
    }
}

fn conflict_or(err: sqlx::Error, key: Option<&str>, operation: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(key.unwrap_or_default().to_string());
        }
    }
    map_sqlx_error(operation, err)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            StoreError::Backend(format!("database error in {operation}: {}", db_err.message()))
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}
