//! Storage seam for tenant-owned rows.
//!
//! Stores are dumb about policy but strict about atomicity: each method is a
//! single tenant-filtered unit of work, and the uniqueness and system-flag
//! checks they report happen inside that unit (a write lock in memory, a
//! transaction plus unique index in Postgres).

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use docvault_core::{EntityId, ScopedEntity, TenantId};

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryDatabase, InMemoryScopedStore};
pub use postgres::{PostgresDatabase, PostgresScopedStore};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// `(tenant_id, key)` is already taken by another row.
    #[error("unique key '{0}' already taken")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Result of an atomic cascading delete.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Row and its join rows are gone.
    Removed { associations: u64 },
    /// No row with that id under that tenant.
    NotFound,
    /// Row exists under that tenant but is a system record; nothing changed.
    Protected,
}

#[async_trait]
pub trait ScopedStore<E: ScopedEntity>: Send + Sync {
    /// Insert a fully stamped row. Fails with [`StoreError::Conflict`] when
    /// the row's key is taken within its tenant.
    async fn insert(&self, entity: E) -> Result<E, StoreError>;

    async fn find(&self, tenant_id: TenantId, id: EntityId) -> Result<Option<E>, StoreError>;

    async fn find_by_key(&self, tenant_id: TenantId, key: &str) -> Result<Option<E>, StoreError>;

    /// Overwrite the row with the same id, only if it belongs to
    /// `entity.tenant_id()`. `Ok(None)` when there is no such row.
    async fn replace(&self, entity: E) -> Result<Option<E>, StoreError>;

    /// Delete a non-system row and every join row referencing it.
    async fn remove_cascade(&self, tenant_id: TenantId, id: EntityId) -> Result<RemoveOutcome, StoreError>;

    /// All rows of the tenant, in no particular order.
    async fn list(&self, tenant_id: TenantId) -> Result<Vec<E>, StoreError>;

    /// Join rows referencing `id` within `tenant_id`.
    async fn count_related(&self, tenant_id: TenantId, id: EntityId) -> Result<u64, StoreError>;
}

#[async_trait]
impl<E, T> ScopedStore<E> for Arc<T>
where
    E: ScopedEntity,
    T: ScopedStore<E> + ?Sized,
{
    async fn insert(&self, entity: E) -> Result<E, StoreError> {
        (**self).insert(entity).await
    }

    async fn find(&self, tenant_id: TenantId, id: EntityId) -> Result<Option<E>, StoreError> {
        (**self).find(tenant_id, id).await
    }

    async fn find_by_key(&self, tenant_id: TenantId, key: &str) -> Result<Option<E>, StoreError> {
        (**self).find_by_key(tenant_id, key).await
    }

    async fn replace(&self, entity: E) -> Result<Option<E>, StoreError> {
        (**self).replace(entity).await
    }

    async fn remove_cascade(&self, tenant_id: TenantId, id: EntityId) -> Result<RemoveOutcome, StoreError> {
        (**self).remove_cascade(tenant_id, id).await
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<E>, StoreError> {
        (**self).list(tenant_id).await
    }

    async fn count_related(&self, tenant_id: TenantId, id: EntityId) -> Result<u64, StoreError> {
        (**self).count_related(tenant_id, id).await
    }
}

/// One side of a join table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `ScopedEntity::KIND` of the referenced entity.
    pub kind: &'static str,
    /// Table holding the referenced rows.
    pub table: &'static str,
    /// Column in the join table referencing that row.
    pub column: &'static str,
}

/// A many-to-many join table between two tenant-owned entities.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AssociationTable {
    pub name: &'static str,
    pub left: Endpoint,
    pub right: Endpoint,
}

impl AssociationTable {
    /// Column referencing rows of `kind`, if this table touches that kind.
    pub fn column_for(&self, kind: &str) -> Option<&'static str> {
        if self.left.kind == kind {
            Some(self.left.column)
        } else if self.right.kind == kind {
            Some(self.right.column)
        } else {
            None
        }
    }
}

/// Where a given entity type lives in a relational store.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub table: &'static str,
    /// Every join table that may reference this entity.
    pub associations: &'static [AssociationTable],
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    AlreadyLinked,
    /// One side does not exist under the tenant.
    MissingEndpoint,
}

#[async_trait]
pub trait AssociationStore: Send + Sync {
    /// Insert a join row after checking, in the same unit of work, that both
    /// endpoints exist under `tenant_id`.
    async fn link(
        &self,
        table: &AssociationTable,
        tenant_id: TenantId,
        left: EntityId,
        right: EntityId,
    ) -> Result<LinkOutcome, StoreError>;

    /// Returns `true` if a join row was removed.
    async fn unlink(
        &self,
        table: &AssociationTable,
        tenant_id: TenantId,
        left: EntityId,
        right: EntityId,
    ) -> Result<bool, StoreError>;

    /// Right-hand ids linked to `left` within `tenant_id`.
    async fn linked(
        &self,
        table: &AssociationTable,
        tenant_id: TenantId,
        left: EntityId,
    ) -> Result<Vec<EntityId>, StoreError>;
}
