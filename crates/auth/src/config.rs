//! Validator configuration.
//!
//! The signing secret is an explicit value handed to the validator at
//! construction; nothing here reads process-global state.

use serde::Deserialize;

/// How much of a token is verified locally.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Algorithm, signature, expiry and issuer are all checked.
    #[default]
    Strict,
    /// Expiry and issuer only. For tokens the trusted provider issued within
    /// the same request flow; never for independent inbound requests.
    FastPath,
}

/// What to do with a token that carries no `exp` claim.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Reject with [`crate::AuthError::MissingExpiry`].
    #[default]
    Require,
    /// Treat the token as non-expiring.
    AllowMissing,
}

#[derive(Clone, Deserialize)]
pub struct ValidatorConfig {
    /// Shared HS256 secret.
    pub secret: String,

    /// Pinned `iss` value; `None` disables the issuer check.
    #[serde(default)]
    pub expected_issuer: Option<String>,

    #[serde(default)]
    pub mode: ValidationMode,

    #[serde(default)]
    pub expiry_policy: ExpiryPolicy,

    /// Clock skew tolerated on `exp` / `nbf`, in seconds.
    #[serde(default)]
    pub leeway_secs: u64,
}

impl ValidatorConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expected_issuer: None,
            mode: ValidationMode::Strict,
            expiry_policy: ExpiryPolicy::Require,
            leeway_secs: 0,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expected_issuer = Some(issuer.into());
        self
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_expiry_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.expiry_policy = policy;
        self
    }

    pub fn with_leeway_secs(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }
}

impl core::fmt::Debug for ValidatorConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ValidatorConfig")
            .field("secret", &"<redacted>")
            .field("expected_issuer", &self.expected_issuer)
            .field("mode", &self.mode)
            .field("expiry_policy", &self.expiry_policy)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_the_secret() {
        let cfg = ValidatorConfig::new("super-secret-value");
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let cfg: ValidatorConfig = serde_json::from_str(r#"{"secret":"s"}"#).unwrap();
        assert_eq!(cfg.mode, ValidationMode::Strict);
        assert_eq!(cfg.expiry_policy, ExpiryPolicy::Require);
        assert_eq!(cfg.expected_issuer, None);
        assert_eq!(cfg.leeway_secs, 0);
    }

    #[test]
    fn deserializes_snake_case_modes() {
        let cfg: ValidatorConfig = serde_json::from_str(
            r#"{"secret":"s","mode":"fast_path","expiry_policy":"allow_missing","expected_issuer":"https://id.example"}"#,
        )
        .unwrap();
        assert_eq!(cfg.mode, ValidationMode::FastPath);
        assert_eq!(cfg.expiry_policy, ExpiryPolicy::AllowMissing);
        assert_eq!(cfg.expected_issuer.as_deref(), Some("https://id.example"));
    }
}
