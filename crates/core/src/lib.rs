//! `docvault-core` — tenant-scoping building blocks shared by every crate.
//!
//! This crate contains **pure** primitives (no storage, no transport).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::{ListOrder, MAX_KEY_LEN, Scope, ScopedEntity, validate_key};
pub use error::{DomainError, DomainResult};
pub use id::{EntityId, TenantId};
