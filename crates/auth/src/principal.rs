use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use docvault_core::TenantId;

use crate::claims::{AuthError, ClaimMap, TimeClaims};
use crate::roles::Role;

/// Identity of an authenticated principal (the token's `sub`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<PrincipalId> for Uuid {
    fn from(value: PrincipalId) -> Self {
        value.0
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Nested claim objects that may carry the tenant id or role.
pub(crate) const APP_METADATA: &str = "app_metadata";
pub(crate) const USER_METADATA: &str = "user_metadata";

/// The verified identity behind a request.
///
/// Built once per request from validated claims and never mutated. A missing
/// `tenant_id` means "no tenant scope yet" (e.g. before the first tenant is
/// created), never "all tenants".
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    subject_id: PrincipalId,
    email: Option<String>,
    tenant_id: Option<TenantId>,
    role: Role,
    issued_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    raw_claims: ClaimMap,
}

impl Principal {
    /// Map validated claims onto the typed principal.
    ///
    /// Only `sub`, `email`, `tenant_id` and `role` are interpreted; everything
    /// else stays in [`Principal::raw_claims`].
    pub fn from_claims(claims: ClaimMap, window: TimeClaims) -> Result<Self, AuthError> {
        let subject_id = claims
            .get("sub")
            .and_then(Value::as_str)
            .and_then(|s| PrincipalId::from_str(s).ok())
            .ok_or(AuthError::InvalidSubject)?;

        let email = claims
            .get("email")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let tenant_id = match first_non_empty(&claims, "tenant_id", &[APP_METADATA, USER_METADATA]) {
            Some(raw) => Some(TenantId::from_str(raw).map_err(|_| AuthError::InvalidTenant)?),
            None => None,
        };

        let role = first_non_empty(&claims, "role", &[APP_METADATA])
            .map(|r| Role::new(r.to_string()))
            .unwrap_or_default();

        Ok(Self {
            subject_id,
            email,
            tenant_id,
            role,
            issued_at: window.issued_at,
            expires_at: window.expires_at,
            raw_claims: claims,
        })
    }

    pub fn subject_id(&self) -> PrincipalId {
        self.subject_id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn raw_claims(&self) -> &ClaimMap {
        &self.raw_claims
    }

    /// Look up a string inside one of the nested metadata objects.
    pub fn metadata_str(&self, object: &str, field: &str) -> Option<&str> {
        self.raw_claims
            .get(object)
            .and_then(|m| m.get(field))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// First non-empty string among the top-level claim and the same field inside
/// each nested object, in order.
fn first_non_empty<'a>(claims: &'a ClaimMap, field: &str, nested: &[&str]) -> Option<&'a str> {
    let top = claims.get(field).and_then(Value::as_str);
    core::iter::once(top)
        .chain(
            nested
                .iter()
                .map(|obj| claims.get(*obj).and_then(|m| m.get(field)).and_then(Value::as_str)),
        )
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
}
