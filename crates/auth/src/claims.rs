//! Token decoding and claim-level checks.
//!
//! A token is three base64url segments: header, payload, signature. This
//! module splits and decodes them and validates the time/issuer claims.
//! Signature verification lives in [`crate::token`].

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::ExpiryPolicy;

/// String-keyed claim payload, kept verbatim for forward compatibility.
pub type ClaimMap = serde_json::Map<String, Value>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("unsupported signing algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token has expired")]
    TokenExpired,

    #[error("token carries no expiry")]
    MissingExpiry,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("token issuer is not trusted")]
    UntrustedIssuer,

    #[error("token subject is not a valid identifier")]
    InvalidSubject,

    #[error("token tenant claim is not a valid identifier")]
    InvalidTenant,

    #[error("identity provider rejected the token")]
    ProviderRejected,

    #[error("token validation unavailable: {0}")]
    ValidationUnavailable(String),
}

impl AuthError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedToken(msg.into())
    }

    /// Stable short name, safe to log (never includes token material).
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::MissingExpiry => "missing_expiry",
            AuthError::NotYetValid => "not_yet_valid",
            AuthError::UntrustedIssuer => "untrusted_issuer",
            AuthError::InvalidSubject => "invalid_subject",
            AuthError::InvalidTenant => "invalid_tenant",
            AuthError::ProviderRejected => "provider_rejected",
            AuthError::ValidationUnavailable(_) => "validation_unavailable",
        }
    }

    /// `true` when the caller must be answered "unauthenticated".
    ///
    /// `ValidationUnavailable` is the only kind that says nothing about the
    /// token itself; it is still terminal and never yields an identity.
    pub fn is_unauthenticated(&self) -> bool {
        !matches!(self, AuthError::ValidationUnavailable(_))
    }
}

/// Decoded JOSE header. Only `alg` is interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default)]
    pub typ: Option<String>,
}

/// A token split into its parts, with header and payload decoded.
#[derive(Debug, Clone)]
pub struct DecodedToken<'a> {
    pub header: TokenHeader,
    pub claims: ClaimMap,
    signing_input: &'a str,
    signature: &'a str,
}

impl<'a> DecodedToken<'a> {
    /// `header + "." + payload`, exactly as received.
    pub fn signing_input(&self) -> &'a str {
        self.signing_input
    }

    /// Third segment, still base64url-encoded.
    pub fn signature(&self) -> &'a str {
        self.signature
    }
}

/// Split a token and decode its header and payload.
pub fn decode(token: &str) -> Result<DecodedToken<'_>, AuthError> {
    let mut segments = token.split('.');
    let (Some(header_seg), Some(payload_seg), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::malformed("expected three dot-separated segments"));
    };

    let header_bytes = decode_segment(header_seg)
        .map_err(|e| AuthError::malformed(format!("header is not base64url: {e}")))?;
    let header: TokenHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| AuthError::malformed(format!("header is not valid JSON: {e}")))?;

    let payload_bytes = decode_segment(payload_seg)
        .map_err(|e| AuthError::malformed(format!("payload is not base64url: {e}")))?;
    let claims: ClaimMap = serde_json::from_slice(&payload_bytes)
        .map_err(|e| AuthError::malformed(format!("payload is not a claim object: {e}")))?;

    Ok(DecodedToken {
        header,
        claims,
        signing_input: &token[..header_seg.len() + 1 + payload_seg.len()],
        signature,
    })
}

/// Decode one base64url segment. Trailing `=` padding is tolerated.
pub(crate) fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(segment.trim_end_matches('='))
}

/// Validity window read from the registered time claims.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimeClaims {
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Deterministically validate `exp` / `nbf` / `iat` against `now`.
pub fn validate_time_claims(
    claims: &ClaimMap,
    now: DateTime<Utc>,
    policy: ExpiryPolicy,
    leeway_secs: u64,
) -> Result<TimeClaims, AuthError> {
    let leeway = i64::try_from(leeway_secs).unwrap_or(i64::MAX);
    let now_secs = now.timestamp();

    let exp = numeric_claim(claims, "exp")?;
    match exp {
        Some(exp) if now_secs > exp.saturating_add(leeway) => return Err(AuthError::TokenExpired),
        Some(_) => {}
        None if policy == ExpiryPolicy::Require => return Err(AuthError::MissingExpiry),
        None => {}
    }

    if let Some(nbf) = numeric_claim(claims, "nbf")? {
        if now_secs.saturating_add(leeway) < nbf {
            return Err(AuthError::NotYetValid);
        }
    }

    let iat = numeric_claim(claims, "iat")?;

    Ok(TimeClaims {
        issued_at: iat.and_then(timestamp),
        expires_at: exp.and_then(timestamp),
    })
}

/// Check `iss` against the pinned issuer, if one is configured.
pub fn validate_issuer(claims: &ClaimMap, expected: Option<&str>) -> Result<(), AuthError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match claims.get("iss").and_then(Value::as_str) {
        Some(iss) if iss == expected => Ok(()),
        _ => Err(AuthError::UntrustedIssuer),
    }
}

/// Read a NumericDate claim (seconds since epoch). Fractional values are
/// truncated toward negative infinity.
fn numeric_claim(claims: &ClaimMap, name: &str) -> Result<Option<i64>, AuthError> {
    match claims.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.floor() as i64))
            .map(Some)
            .ok_or_else(|| AuthError::malformed(format!("claim '{name}' is out of range"))),
        Some(_) => Err(AuthError::malformed(format!("claim '{name}' must be numeric"))),
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(v: &Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(v).unwrap())
    }

    fn claims(v: Value) -> ClaimMap {
        match v {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn rejects_wrong_segment_counts() {
        for token in ["", "a", "a.b", "a.b.c.d"] {
            assert!(matches!(decode(token), Err(AuthError::MalformedToken(_))), "{token}");
        }
    }

    #[test]
    fn rejects_undecodable_header_and_payload() {
        let good = encode(&json!({"alg": "HS256"}));
        assert!(matches!(
            decode(&format!("!!!.{good}.sig")),
            Err(AuthError::MalformedToken(_))
        ));
        assert!(matches!(
            decode(&format!("{good}.%%%.sig")),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn rejects_non_object_payload() {
        let header = encode(&json!({"alg": "HS256"}));
        let payload = encode(&json!([1, 2, 3]));
        assert!(matches!(
            decode(&format!("{header}.{payload}.sig")),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn keeps_signing_input_verbatim() {
        let header = encode(&json!({"alg": "HS256", "typ": "JWT"}));
        let payload = encode(&json!({"sub": "x"}));
        let token = format!("{header}.{payload}.c2ln");
        let decoded = decode(&token).unwrap();
        assert_eq!(decoded.signing_input(), format!("{header}.{payload}"));
        assert_eq!(decoded.signature(), "c2ln");
        assert_eq!(decoded.header.alg, "HS256");
        assert_eq!(decoded.claims.get("sub"), Some(&json!("x")));
    }

    #[test]
    fn tolerates_padded_segments() {
        let header = format!("{}==", encode(&json!({"alg": "HS256"})));
        let payload = encode(&json!({}));
        assert!(decode(&format!("{header}.{payload}.x")).is_ok());
    }

    #[test]
    fn expiry_is_checked_against_now() {
        let now = Utc::now();
        let past = claims(json!({"exp": now.timestamp() - 1}));
        assert_eq!(
            validate_time_claims(&past, now, ExpiryPolicy::Require, 0),
            Err(AuthError::TokenExpired)
        );

        let at_exp = claims(json!({"exp": now.timestamp()}));
        assert!(validate_time_claims(&at_exp, now, ExpiryPolicy::Require, 0).is_ok());

        assert!(validate_time_claims(&past, now, ExpiryPolicy::Require, 5).is_ok());
    }

    #[test]
    fn missing_expiry_follows_policy() {
        let now = Utc::now();
        let none = claims(json!({}));
        assert_eq!(
            validate_time_claims(&none, now, ExpiryPolicy::Require, 0),
            Err(AuthError::MissingExpiry)
        );
        let window = validate_time_claims(&none, now, ExpiryPolicy::AllowMissing, 0).unwrap();
        assert_eq!(window.expires_at, None);
    }

    #[test]
    fn not_before_in_the_future_is_rejected() {
        let now = Utc::now();
        let c = claims(json!({"exp": now.timestamp() + 60, "nbf": now.timestamp() + 30}));
        assert_eq!(
            validate_time_claims(&c, now, ExpiryPolicy::Require, 0),
            Err(AuthError::NotYetValid)
        );
    }

    #[test]
    fn non_numeric_time_claims_are_malformed() {
        let now = Utc::now();
        let c = claims(json!({"exp": "tomorrow"}));
        assert!(matches!(
            validate_time_claims(&c, now, ExpiryPolicy::Require, 0),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn issuer_must_match_when_pinned() {
        let c = claims(json!({"iss": "https://id.example"}));
        assert!(validate_issuer(&c, None).is_ok());
        assert!(validate_issuer(&c, Some("https://id.example")).is_ok());
        assert_eq!(
            validate_issuer(&c, Some("https://evil.example")),
            Err(AuthError::UntrustedIssuer)
        );
        assert_eq!(
            validate_issuer(&claims(json!({})), Some("https://id.example")),
            Err(AuthError::UntrustedIssuer)
        );
    }
}
