//! Round-trip to the upstream identity provider.
//!
//! Used only when local verification is deliberately bypassed. The provider's
//! contract is "given a token, return the same claim shape or an error".

use async_trait::async_trait;
use thiserror::Error;

use crate::claims::ClaimMap;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider looked at the token and refused it.
    #[error("token rejected by provider: {0}")]
    Rejected(String),

    /// The provider could not be reached or answered with an error.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn fetch_claims(&self, token: &str) -> Result<ClaimMap, ProviderError>;
}
