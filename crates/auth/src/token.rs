//! Bearer-token validation.
//!
//! The validator is pure: no IO, no shared mutable state, safe to share
//! across request handlers behind an `Arc`. Check order is decode → expiry →
//! issuer → algorithm/signature (strict only) → subject mapping, so an expired
//! token reports `TokenExpired` whatever its signature.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::claims::{
    AuthError, ClaimMap, DecodedToken, decode, validate_issuer, validate_time_claims,
};
use crate::config::{ValidationMode, ValidatorConfig};
use crate::principal::Principal;
use crate::provider::{IdentityProvider, ProviderError};

type HmacSha256 = Hmac<Sha256>;

/// The only algorithm accepted in strict mode.
pub const HS256: &str = "HS256";

/// A token the trusted provider handed back within the current request flow
/// (e.g. the response to a sign-in call).
///
/// Constructing one is an explicit statement by the caller; tokens read from
/// an inbound `Authorization` header must never be wrapped in this type.
#[derive(Debug, Clone, Copy)]
pub struct FreshToken<'a>(&'a str);

impl<'a> FreshToken<'a> {
    pub fn just_issued(token: &'a str) -> Self {
        Self(token)
    }

    pub fn as_str(&self) -> &'a str {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct TokenValidator {
    config: ValidatorConfig,
}

impl TokenValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        if config.mode == ValidationMode::FastPath {
            tracing::warn!(
                "token validator configured for fast-path mode; `validate` skips signatures, inbound requests still verify them"
            );
        }
        Self { config }
    }

    pub fn mode(&self) -> ValidationMode {
        self.config.mode
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a bearer token read from an inbound request.
    ///
    /// Always strict: the signature is verified whatever mode is configured.
    pub fn validate_inbound(&self, token: &str) -> Result<Principal, AuthError> {
        self.validate_inbound_at(token, Utc::now())
    }

    /// Same as [`TokenValidator::validate_inbound`] with an explicit clock.
    pub fn validate_inbound_at(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, AuthError> {
        self.run(token, now, ValidationMode::Strict)
    }

    /// Validate a token using the configured mode.
    ///
    /// Under `FastPath` the signature is not checked, so this is only for
    /// tokens obtained inside a trusted flow. Use
    /// [`TokenValidator::validate_inbound`] for request headers.
    pub fn validate(&self, token: &str) -> Result<Principal, AuthError> {
        self.validate_at(token, Utc::now())
    }

    /// Same as [`TokenValidator::validate`] with an explicit clock.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, AuthError> {
        self.run(token, now, self.config.mode)
    }

    /// Extract claims from a token issued moments ago in the same flow,
    /// checking expiry and issuer but not the signature.
    pub fn validate_fresh(&self, token: FreshToken<'_>, now: DateTime<Utc>) -> Result<Principal, AuthError> {
        self.run(token.as_str(), now, ValidationMode::FastPath)
    }

    /// Ask the identity provider for the claims instead of verifying locally.
    ///
    /// The call is bounded by `timeout`; a timeout or an unreachable provider
    /// fails with `ValidationUnavailable` and never yields an identity. The
    /// returned claims still go through the expiry, issuer and subject checks.
    pub async fn validate_remote<P>(
        &self,
        token: &str,
        provider: &P,
        timeout: Duration,
    ) -> Result<Principal, AuthError>
    where
        P: IdentityProvider + ?Sized,
    {
        let claims = match tokio::time::timeout(timeout, provider.fetch_claims(token)).await {
            Err(_) => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "identity provider timed out");
                return Err(AuthError::ValidationUnavailable("provider timed out".to_string()));
            }
            Ok(Err(ProviderError::Unavailable(msg))) => {
                tracing::warn!(error = %msg, "identity provider unavailable");
                return Err(AuthError::ValidationUnavailable(msg));
            }
            Ok(Err(ProviderError::Rejected(_))) => return Err(AuthError::ProviderRejected),
            Ok(Ok(claims)) => claims,
        };
        self.principal_from(claims, Utc::now())
    }

    fn run(&self, token: &str, now: DateTime<Utc>, mode: ValidationMode) -> Result<Principal, AuthError> {
        let result = decode(token).and_then(|decoded| {
            let window = validate_time_claims(
                &decoded.claims,
                now,
                self.config.expiry_policy,
                self.config.leeway_secs,
            )?;
            validate_issuer(&decoded.claims, self.config.expected_issuer.as_deref())?;
            if mode == ValidationMode::Strict {
                verify_hs256(&decoded, self.config.secret.as_bytes())?;
            }
            Principal::from_claims(decoded.claims, window)
        });

        if let Err(e) = &result {
            tracing::debug!(reason = e.kind(), ?mode, "bearer token rejected");
        }
        result
    }

    fn principal_from(&self, claims: ClaimMap, now: DateTime<Utc>) -> Result<Principal, AuthError> {
        let window = validate_time_claims(
            &claims,
            now,
            self.config.expiry_policy,
            self.config.leeway_secs,
        )?;
        validate_issuer(&claims, self.config.expected_issuer.as_deref())?;
        Principal::from_claims(claims, window)
    }
}

/// Recompute HMAC-SHA256 over `header.payload` and compare it with the
/// token's signature segment in constant time.
fn verify_hs256(decoded: &DecodedToken<'_>, secret: &[u8]) -> Result<(), AuthError> {
    if decoded.header.alg != HS256 {
        return Err(AuthError::UnsupportedAlgorithm(decoded.header.alg.clone()));
    }
    let signature = URL_SAFE_NO_PAD
        .decode(decoded.signature())
        .map_err(|_| AuthError::InvalidSignature)?;
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| AuthError::InvalidSignature)?;
    mac.update(decoded.signing_input().as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AuthError::InvalidSignature)
}

/// Sign `claims` as an HS256 token.
///
/// For trusted local issuance (the sign-in flow, tests, benches); inbound
/// tokens are issued by the upstream provider.
pub fn encode_hs256<T: Serialize>(claims: &T, secret: &[u8]) -> Result<String, serde_json::Error> {
    let header = serde_json::json!({ "alg": HS256, "typ": "JWT" });
    let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let signing_input = format!("{header}.{payload}");

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature}"))
}
