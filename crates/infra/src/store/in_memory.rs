//! In-memory tenant-scoped storage for tests/dev.
//!
//! All entity tables and join tables share one `RwLock`, so a cascading
//! delete or a link with its endpoint checks is a single critical section,
//! the same guarantee a database transaction gives.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use docvault_core::{EntityId, ScopedEntity, TenantId};

use super::{AssociationStore, AssociationTable, LinkOutcome, RemoveOutcome, ScopedStore, StoreError};

struct StoredRow {
    tenant_id: TenantId,
    is_system: bool,
    key: Option<String>,
    value: Box<dyn Any + Send + Sync>,
}

impl StoredRow {
    fn new<E: ScopedEntity>(entity: E) -> Self {
        Self {
            tenant_id: entity.tenant_id(),
            is_system: entity.is_system(),
            key: entity.unique_key().map(str::to_string),
            value: Box::new(entity),
        }
    }

    fn decode<E: ScopedEntity>(&self) -> Result<E, StoreError> {
        self.value
            .downcast_ref::<E>()
            .cloned()
            .ok_or_else(|| StoreError::Backend(format!("row is not a {}", E::KIND)))
    }
}

struct LinkRow {
    table: &'static str,
    tenant_id: TenantId,
    left: EntityId,
    right: EntityId,
}

impl LinkRow {
    fn references(&self, id: EntityId) -> bool {
        self.left == id || self.right == id
    }
}

#[derive(Default)]
struct Tables {
    rows: HashMap<&'static str, HashMap<EntityId, StoredRow>>,
    links: Vec<LinkRow>,
}

impl Tables {
    fn row(&self, kind: &str, tenant_id: TenantId, id: EntityId) -> Option<&StoredRow> {
        self.rows
            .get(kind)
            .and_then(|t| t.get(&id))
            .filter(|r| r.tenant_id == tenant_id)
    }

    fn key_taken(&self, kind: &str, tenant_id: TenantId, key: &str, except: EntityId) -> bool {
        self.rows.get(kind).is_some_and(|t| {
            t.iter().any(|(id, r)| {
                *id != except && r.tenant_id == tenant_id && r.key.as_deref() == Some(key)
            })
        })
    }
}

/// Shared in-memory backing for every entity store and join table.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    inner: Arc<RwLock<Tables>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed view over one entity table.
    pub fn store<E: ScopedEntity>(&self) -> InMemoryScopedStore<E> {
        InMemoryScopedStore {
            db: self.clone(),
            _entity: PhantomData,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

impl core::fmt::Debug for InMemoryDatabase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryDatabase").finish_non_exhaustive()
    }
}

/// Tenant-isolated in-memory table for one entity type.
pub struct InMemoryScopedStore<E> {
    db: InMemoryDatabase,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for InMemoryScopedStore<E> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> core::fmt::Debug for InMemoryScopedStore<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryScopedStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl<E: ScopedEntity> ScopedStore<E> for InMemoryScopedStore<E> {
    async fn insert(&self, entity: E) -> Result<E, StoreError> {
        let mut tables = self.db.write()?;
        if let Some(key) = entity.unique_key() {
            if tables.key_taken(E::KIND, entity.tenant_id(), key, entity.id()) {
                return Err(StoreError::Conflict(key.to_string()));
            }
        }
        let table = tables.rows.entry(E::KIND).or_default();
        if table.contains_key(&entity.id()) {
            return Err(StoreError::Backend(format!("duplicate {} id {}", E::KIND, entity.id())));
        }
        table.insert(entity.id(), StoredRow::new(entity.clone()));
        Ok(entity)
    }

    async fn find(&self, tenant_id: TenantId, id: EntityId) -> Result<Option<E>, StoreError> {
        let tables = self.db.read()?;
        tables
            .row(E::KIND, tenant_id, id)
            .map(StoredRow::decode::<E>)
            .transpose()
    }

    async fn find_by_key(&self, tenant_id: TenantId, key: &str) -> Result<Option<E>, StoreError> {
        let tables = self.db.read()?;
        tables
            .rows
            .get(E::KIND)
            .and_then(|t| {
                t.values()
                    .find(|r| r.tenant_id == tenant_id && r.key.as_deref() == Some(key))
            })
            .map(StoredRow::decode::<E>)
            .transpose()
    }

    async fn replace(&self, entity: E) -> Result<Option<E>, StoreError> {
        let mut tables = self.db.write()?;
        let tenant_id = entity.tenant_id();
        if tables.row(E::KIND, tenant_id, entity.id()).is_none() {
            return Ok(None);
        }
        if let Some(key) = entity.unique_key() {
            if tables.key_taken(E::KIND, tenant_id, key, entity.id()) {
                return Err(StoreError::Conflict(key.to_string()));
            }
        }
        tables
            .rows
            .entry(E::KIND)
            .or_default()
            .insert(entity.id(), StoredRow::new(entity.clone()));
        Ok(Some(entity))
    }

    async fn remove_cascade(&self, tenant_id: TenantId, id: EntityId) -> Result<RemoveOutcome, StoreError> {
        let mut tables = self.db.write()?;
        match tables.row(E::KIND, tenant_id, id) {
            None => return Ok(RemoveOutcome::NotFound),
            Some(row) if row.is_system => return Ok(RemoveOutcome::Protected),
            Some(_) => {}
        }

        if let Some(table) = tables.rows.get_mut(E::KIND) {
            table.remove(&id);
        }
        let before = tables.links.len();
        tables.links.retain(|l| !l.references(id));
        let associations = (before - tables.links.len()) as u64;

        Ok(RemoveOutcome::Removed { associations })
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<E>, StoreError> {
        let tables = self.db.read()?;
        let Some(table) = tables.rows.get(E::KIND) else {
            return Ok(vec![]);
        };
        table
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .map(StoredRow::decode::<E>)
            .collect()
    }

    async fn count_related(&self, tenant_id: TenantId, id: EntityId) -> Result<u64, StoreError> {
        let tables = self.db.read()?;
        Ok(tables
            .links
            .iter()
            .filter(|l| l.tenant_id == tenant_id && l.references(id))
            .count() as u64)
    }
}

#[async_trait]
impl AssociationStore for InMemoryDatabase {
    async fn link(
        &self,
        table: &AssociationTable,
        tenant_id: TenantId,
        left: EntityId,
        right: EntityId,
    ) -> Result<LinkOutcome, StoreError> {
        let mut tables = self.write()?;
        if tables.row(table.left.kind, tenant_id, left).is_none()
            || tables.row(table.right.kind, tenant_id, right).is_none()
        {
            return Ok(LinkOutcome::MissingEndpoint);
        }
        let exists = tables
            .links
            .iter()
            .any(|l| l.table == table.name && l.left == left && l.right == right);
        if exists {
            return Ok(LinkOutcome::AlreadyLinked);
        }
        tables.links.push(LinkRow {
            table: table.name,
            tenant_id,
            left,
            right,
        });
        Ok(LinkOutcome::Linked)
    }

    async fn unlink(
        &self,
        table: &AssociationTable,
        tenant_id: TenantId,
        left: EntityId,
        right: EntityId,
    ) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        let before = tables.links.len();
        tables.links.retain(|l| {
            !(l.table == table.name && l.tenant_id == tenant_id && l.left == left && l.right == right)
        });
        Ok(tables.links.len() != before)
    }

    async fn linked(
        &self,
        table: &AssociationTable,
        tenant_id: TenantId,
        left: EntityId,
    ) -> Result<Vec<EntityId>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .links
            .iter()
            .filter(|l| l.table == table.name && l.tenant_id == tenant_id && l.left == left)
            .map(|l| l.right)
            .collect())
    }
}
