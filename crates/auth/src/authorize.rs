use thiserror::Error;

use docvault_core::TenantId;

use crate::{Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// The principal has not been bound to a tenant yet.
    #[error("no tenant scope")]
    NoTenantScope,

    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: requires role '{0}'")]
    Forbidden(String),
}

impl Principal {
    /// The tenant every data access must be confined to.
    ///
    /// A principal without a tenant is rejected rather than treated as a
    /// wildcard.
    pub fn require_tenant(&self) -> Result<TenantId, AuthzError> {
        self.tenant_id().ok_or(AuthzError::NoTenantScope)
    }
}

/// Check that the principal acts within `tenant_id`.
///
/// - No IO
/// - No panics
pub fn ensure_same_tenant(principal: &Principal, tenant_id: TenantId) -> Result<(), AuthzError> {
    if principal.require_tenant()? != tenant_id {
        return Err(AuthzError::TenantMismatch);
    }
    Ok(())
}

/// Check that the principal holds at least `minimum` within its tenant.
pub fn require_role(principal: &Principal, minimum: &Role) -> Result<TenantId, AuthzError> {
    let tenant_id = principal.require_tenant()?;
    if principal.role().satisfies(minimum) {
        Ok(tenant_id)
    } else {
        Err(AuthzError::Forbidden(minimum.as_str().to_string()))
    }
}
