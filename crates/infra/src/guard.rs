//! Tenant-scoped access guard.
//!
//! The guard is the only way callers touch tenant-owned rows. It owns the
//! policy (ownership, system protection, validation, server-stamped columns)
//! while the [`ScopedStore`] underneath owns atomicity.
//!
//! Cross-tenant access always reads as [`GuardError::NotFound`]: ownership is
//! checked before anything else so no other error can reveal that a row exists
//! under a different tenant.

use std::marker::PhantomData;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use docvault_core::{DomainError, EntityId, ListOrder, Scope, ScopedEntity, TenantId, validate_key};

use crate::store::{RemoveOutcome, ScopedStore, StoreError};

pub type GuardResult<T> = Result<T, GuardError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// Row does not exist under the caller's tenant (or does not exist at all).
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{entity} '{key}' already exists")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("{entity} is a system record and cannot be changed this way")]
    SystemEntityProtected { entity: &'static str },

    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("storage error: {0}")]
    Store(String),
}

impl GuardError {
    /// Stable machine-readable code, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            GuardError::NotFound { .. } => "not_found",
            GuardError::AlreadyExists { .. } => "already_exists",
            GuardError::SystemEntityProtected { .. } => "system_entity_protected",
            GuardError::Validation(_) => "validation_error",
            GuardError::Store(_) => "storage_error",
        }
    }

    fn from_store<E: ScopedEntity>(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(key) => GuardError::AlreadyExists { entity: E::KIND, key },
            StoreError::Backend(msg) => GuardError::Store(msg),
        }
    }

    fn not_found<E: ScopedEntity>() -> Self {
        GuardError::NotFound { entity: E::KIND }
    }
}

/// Generic repository enforcing tenant isolation for one entity type.
///
/// Holds no mutable state of its own; clone it or share it behind an `Arc`
/// across request handlers.
pub struct TenantGuard<E, S> {
    store: S,
    _entity: PhantomData<fn() -> E>,
}

impl<E, S: Clone> Clone for TenantGuard<E, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E, S: core::fmt::Debug> core::fmt::Debug for TenantGuard<E, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TenantGuard").field("store", &self.store).finish()
    }
}

impl<E, S> TenantGuard<E, S>
where
    E: ScopedEntity,
    S: ScopedStore<E>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    /// Create a user-owned row. Server-owned columns on `entity` are ignored.
    #[instrument(skip(self, entity), fields(entity = E::KIND, tenant_id = %tenant_id), err)]
    pub async fn create(&self, tenant_id: TenantId, entity: E) -> GuardResult<E> {
        self.insert_stamped(tenant_id, entity, false).await
    }

    /// Create a system row (undeletable, key frozen). Only seeding code should
    /// call this; request handlers go through [`TenantGuard::create`].
    #[instrument(skip(self, entity), fields(entity = E::KIND, tenant_id = %tenant_id), err)]
    pub async fn seed_system(&self, tenant_id: TenantId, entity: E) -> GuardResult<E> {
        self.insert_stamped(tenant_id, entity, true).await
    }

    async fn insert_stamped(&self, tenant_id: TenantId, mut entity: E, is_system: bool) -> GuardResult<E> {
        if tenant_id.is_nil() {
            return Err(DomainError::validation("tenant id is required").into());
        }
        *entity.scope_mut() = Scope::assigned(tenant_id, is_system, Utc::now());
        validate::<E>(&entity)?;

        let created = self
            .store
            .insert(entity)
            .await
            .map_err(GuardError::from_store::<E>)?;

        info!(id = %created.id(), is_system, "created");
        Ok(created)
    }

    #[instrument(skip(self), fields(entity = E::KIND), err)]
    pub async fn get_by_id(&self, tenant_id: TenantId, id: EntityId) -> GuardResult<E> {
        self.store
            .find(tenant_id, id)
            .await
            .map_err(GuardError::from_store::<E>)?
            .ok_or_else(GuardError::not_found::<E>)
    }

    #[instrument(skip(self), fields(entity = E::KIND), err)]
    pub async fn get_by_key(&self, tenant_id: TenantId, key: &str) -> GuardResult<E> {
        self.store
            .find_by_key(tenant_id, key)
            .await
            .map_err(GuardError::from_store::<E>)?
            .ok_or_else(GuardError::not_found::<E>)
    }

    /// Apply caller changes to an existing row.
    ///
    /// `id` comes from `entity`; `tenant_id`, `created_at` and `is_system` are
    /// taken from the stored row, and `updated_at` is refreshed. A system row
    /// may change any field except its key.
    #[instrument(skip(self, entity), fields(entity = E::KIND, tenant_id = %tenant_id, id = %entity.id()), err)]
    pub async fn update(&self, tenant_id: TenantId, mut entity: E) -> GuardResult<E> {
        let current = self.get_by_id(tenant_id, entity.id()).await?;

        if current.is_system() && current.unique_key() != entity.unique_key() {
            warn!("rejected rename of system record");
            return Err(GuardError::SystemEntityProtected { entity: E::KIND });
        }

        *entity.scope_mut() = Scope {
            updated_at: Utc::now(),
            ..current.scope().clone()
        };
        validate::<E>(&entity)?;

        let updated = self
            .store
            .replace(entity)
            .await
            .map_err(GuardError::from_store::<E>)?
            // Deleted between the read and the write.
            .ok_or_else(GuardError::not_found::<E>)?;

        debug!("updated");
        Ok(updated)
    }

    /// Delete a row and every association referencing it.
    ///
    /// Returns how many association rows were removed with it.
    #[instrument(skip(self), fields(entity = E::KIND), err)]
    pub async fn delete(&self, tenant_id: TenantId, id: EntityId) -> GuardResult<u64> {
        match self
            .store
            .remove_cascade(tenant_id, id)
            .await
            .map_err(GuardError::from_store::<E>)?
        {
            RemoveOutcome::Removed { associations } => {
                info!(associations, "deleted");
                Ok(associations)
            }
            RemoveOutcome::NotFound => Err(GuardError::not_found::<E>()),
            RemoveOutcome::Protected => {
                warn!("rejected delete of system record");
                Err(GuardError::SystemEntityProtected { entity: E::KIND })
            }
        }
    }

    #[instrument(skip(self), fields(entity = E::KIND), err)]
    pub async fn list(&self, tenant_id: TenantId, order: ListOrder) -> GuardResult<Vec<E>> {
        let mut rows = self
            .store
            .list(tenant_id)
            .await
            .map_err(GuardError::from_store::<E>)?;
        order.sort(&mut rows);
        Ok(rows)
    }

    /// Number of association rows referencing an entity already fetched
    /// through this guard. Zero when nothing references it.
    #[instrument(skip(self, entity), fields(entity = E::KIND, id = %entity.id()), err)]
    pub async fn count_related(&self, entity: &E) -> GuardResult<u64> {
        self.store
            .count_related(entity.tenant_id(), entity.id())
            .await
            .map_err(GuardError::from_store::<E>)
    }
}

fn validate<E: ScopedEntity>(entity: &E) -> GuardResult<()> {
    if let Some(key) = entity.unique_key() {
        validate_key(E::KIND, key)?;
    }
    entity.validate()?;
    Ok(())
}
