//! The shape shared by every tenant-owned row.
//!
//! Storage and guards are written once against [`ScopedEntity`]; a new entity
//! type only describes its key, its system flag and its ordering fields.

use core::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{EntityId, TenantId};

/// Upper bound for uniqueness keys (mirrors the `VARCHAR(255)` columns).
pub const MAX_KEY_LEN: usize = 255;

/// Server-owned columns carried by every tenant-owned row.
///
/// Callers never choose these: the guard stamps them on create and preserves
/// them on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Scope {
    /// Placeholder scope for a row that has not been created yet.
    pub fn draft() -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::nil(),
            tenant_id: TenantId::nil(),
            is_system: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Scope for a freshly created row.
    pub fn assigned(tenant_id: TenantId, is_system: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: EntityId::new(),
            tenant_id,
            is_system,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::draft()
    }
}

/// A persisted record that must be filtered and authorized by tenant id.
pub trait ScopedEntity: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable entity kind, used in logs and error messages (e.g. `"category"`).
    const KIND: &'static str;

    fn scope(&self) -> &Scope;

    fn scope_mut(&mut self) -> &mut Scope;

    /// Per-tenant uniqueness key, if this entity type has one.
    fn unique_key(&self) -> Option<&str> {
        None
    }

    /// Primary list ordering key. `None` sorts after every explicit value.
    fn sort_order(&self) -> Option<i32> {
        None
    }

    /// Secondary list ordering key.
    fn sort_name(&self) -> &str;

    /// Entity-specific validation, run before every write.
    fn validate(&self) -> DomainResult<()> {
        Ok(())
    }

    fn id(&self) -> EntityId {
        self.scope().id
    }

    fn tenant_id(&self) -> TenantId {
        self.scope().tenant_id
    }

    fn is_system(&self) -> bool {
        self.scope().is_system
    }
}

/// Validate a uniqueness key: non-blank and bounded.
pub fn validate_key(kind: &str, key: &str) -> DomainResult<()> {
    if key.trim().is_empty() {
        return Err(DomainError::validation(format!("{kind} name cannot be empty")));
    }
    if key.chars().count() > MAX_KEY_LEN {
        return Err(DomainError::validation(format!(
            "{kind} name exceeds {MAX_KEY_LEN} characters"
        )));
    }
    Ok(())
}

/// Deterministic list ordering.
///
/// Every chain ends with the entity id so rows that tie on every visible
/// field still come back in the same order on every call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    /// `sort_order` ascending (unset last), then name, then id.
    #[default]
    SortOrderThenName,
    /// Name ascending, then id.
    NameThenId,
}

impl ListOrder {
    pub fn compare<E: ScopedEntity>(self, a: &E, b: &E) -> Ordering {
        match self {
            ListOrder::SortOrderThenName => compare_sort_order(a.sort_order(), b.sort_order())
                .then_with(|| a.sort_name().cmp(b.sort_name()))
                .then_with(|| a.id().cmp(&b.id())),
            ListOrder::NameThenId => a
                .sort_name()
                .cmp(b.sort_name())
                .then_with(|| a.id().cmp(&b.id())),
        }
    }

    pub fn sort<E: ScopedEntity>(self, rows: &mut [E]) {
        rows.sort_by(|a, b| self.compare(a, b));
    }
}

fn compare_sort_order(a: Option<i32>, b: Option<i32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
