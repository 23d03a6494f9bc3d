//! `docvault-auth` — bearer-token validation and tenant-scope authorization.
//!
//! This crate is intentionally decoupled from HTTP and storage: it turns a
//! token string into a [`Principal`] and answers tenant/role questions about it.

pub mod authorize;
pub mod claims;
pub mod config;
pub mod principal;
pub mod provider;
pub mod roles;
pub mod token;
pub mod user;

pub use authorize::{AuthzError, ensure_same_tenant, require_role};
pub use claims::{
    AuthError, ClaimMap, DecodedToken, TimeClaims, TokenHeader, decode, validate_issuer,
    validate_time_claims,
};
pub use config::{ExpiryPolicy, ValidationMode, ValidatorConfig};
pub use principal::{Principal, PrincipalId};
pub use provider::{IdentityProvider, ProviderError};
pub use roles::Role;
pub use token::{FreshToken, TokenValidator, encode_hs256};
pub use user::UserRecord;
