//! Infrastructure layer: tenant-scoped storage and the access guard.
//!
//! Every read and write of a tenant-owned row goes through [`TenantGuard`],
//! which is written once against [`docvault_core::ScopedEntity`] so a new
//! entity type cannot opt out of isolation.

pub mod guard;
pub mod store;

pub use guard::{GuardError, GuardResult, TenantGuard};
pub use store::{
    AssociationStore, AssociationTable, Endpoint, InMemoryDatabase, InMemoryScopedStore,
    LinkOutcome, PostgresDatabase, PostgresScopedStore, RemoveOutcome, ScopedStore, StoreError,
    TableSpec,
};
