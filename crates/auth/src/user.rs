//! Identity-model translation: token claims ⇄ internal user record.
//!
//! The upstream provider owns credentials; this side keeps a thin user row
//! keyed by the provider's subject id and bound to at most one tenant.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use docvault_core::TenantId;

use crate::authorize::AuthzError;
use crate::claims::ClaimMap;
use crate::principal::{APP_METADATA, Principal, PrincipalId, USER_METADATA};
use crate::roles::Role;

// ─────────────────────────────────────────────────────────────────────────────
// User Record
// ─────────────────────────────────────────────────────────────────────────────

/// Internal user row mirrored from the identity provider.
///
/// # Invariants
/// - `id` is the provider's subject id and never changes.
/// - `tenant_id` is assigned once; a user never moves between tenants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: PrincipalId,
    pub email: Option<String>,
    pub tenant_id: Option<TenantId>,
    pub role: Role,
    pub display_name: String,
    /// Provider-side profile fields (`user_metadata`), passed through as-is.
    #[serde(default)]
    pub metadata: ClaimMap,
}

impl UserRecord {
    /// Derive the internal record from a validated principal.
    pub fn from_principal(principal: &Principal) -> Self {
        let metadata = principal
            .raw_claims()
            .get(USER_METADATA)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let display_name = principal
            .metadata_str(USER_METADATA, "full_name")
            .or_else(|| principal.metadata_str(USER_METADATA, "name"))
            .map(str::to_string)
            .or_else(|| {
                principal
                    .email()
                    .and_then(|e| e.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| principal.subject_id().to_string());

        Self {
            id: principal.subject_id(),
            email: principal.email().map(str::to_string),
            tenant_id: principal.tenant_id(),
            role: principal.role().clone(),
            display_name,
            metadata,
        }
    }

    /// Build the claim set a provider would issue for this user.
    ///
    /// The tenant id is written both top-level and under `app_metadata` so
    /// either lookup path resolves it.
    pub fn to_claims(&self, issued_at: DateTime<Utc>, ttl: Duration, issuer: Option<&str>) -> ClaimMap {
        let mut claims = ClaimMap::new();
        claims.insert("sub".into(), json!(self.id.to_string()));
        claims.insert("role".into(), json!(self.role.as_str()));
        claims.insert("iat".into(), json!(issued_at.timestamp()));
        claims.insert("exp".into(), json!((issued_at + ttl).timestamp()));
        if let Some(email) = &self.email {
            claims.insert("email".into(), json!(email));
        }
        if let Some(iss) = issuer {
            claims.insert("iss".into(), json!(iss));
        }

        let mut app = ClaimMap::new();
        app.insert("role".into(), json!(self.role.as_str()));
        if let Some(tenant_id) = self.tenant_id {
            claims.insert("tenant_id".into(), json!(tenant_id.to_string()));
            app.insert("tenant_id".into(), json!(tenant_id.to_string()));
        }
        claims.insert(APP_METADATA.into(), Value::Object(app));

        let mut user = self.metadata.clone();
        user.insert("full_name".into(), json!(self.display_name));
        claims.insert(USER_METADATA.into(), Value::Object(user));

        claims
    }

    /// Bind the user to its tenant (initial tenant creation).
    ///
    /// Idempotent for the same tenant; moving to another tenant is refused.
    pub fn assign_tenant(&mut self, tenant_id: TenantId) -> Result<(), AuthzError> {
        match self.tenant_id {
            None => {
                self.tenant_id = Some(tenant_id);
                Ok(())
            }
            Some(current) if current == tenant_id => Ok(()),
            Some(_) => Err(AuthzError::TenantMismatch),
        }
    }
}
