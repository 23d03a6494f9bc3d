//! Process configuration read from the environment.

use std::net::SocketAddr;

use thiserror::Error;

use docvault_auth::{ExpiryPolicy, ValidationMode, ValidatorConfig};

const DEV_SECRET: &str = "dev-secret";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

/// Everything the server needs at startup.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub validator: ValidatorConfig,
    /// Postgres URL; `None` runs against the in-memory store.
    pub database_url: Option<String>,
}

impl ApiConfig {
    /// Read the configuration from process environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `JWT_SECRET` | insecure dev value (logged as a warning) |
    /// | `JWT_ISSUER` | unset: issuer not checked |
    /// | `JWT_VALIDATION_MODE` | `strict` (`fast_path` to skip signatures) |
    /// | `JWT_ALLOW_MISSING_EXP` | `false` |
    /// | `JWT_LEEWAY_SECS` | `0` |
    /// | `BIND_ADDR` | `0.0.0.0:8080` |
    /// | `DATABASE_URL` | unset: in-memory store |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ApiConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let secret = var("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_SECRET.to_string()
        });

        let mut validator = ValidatorConfig::new(secret)
            .with_mode(parse_mode(var("JWT_VALIDATION_MODE").as_deref())?)
            .with_expiry_policy(parse_expiry_policy(var("JWT_ALLOW_MISSING_EXP").as_deref())?);

        if let Some(issuer) = var("JWT_ISSUER") {
            validator = validator.with_issuer(issuer);
        }
        if let Some(leeway) = var("JWT_LEEWAY_SECS") {
            let secs = leeway
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::invalid("JWT_LEEWAY_SECS", e.to_string()))?;
            validator = validator.with_leeway_secs(secs);
        }

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("BIND_ADDR", e.to_string()))?;

        Ok(Self {
            bind_addr,
            validator,
            database_url: var("DATABASE_URL"),
        })
    }
}

fn parse_mode(value: Option<&str>) -> Result<ValidationMode, ConfigError> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("strict") => Ok(ValidationMode::Strict),
        Some("fast_path") | Some("fast-path") => Ok(ValidationMode::FastPath),
        Some(other) => Err(ConfigError::invalid(
            "JWT_VALIDATION_MODE",
            format!("expected 'strict' or 'fast_path', got '{other}'"),
        )),
    }
}

fn parse_expiry_policy(value: Option<&str>) -> Result<ExpiryPolicy, ConfigError> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("false") | Some("0") => Ok(ExpiryPolicy::Require),
        Some("true") | Some("1") => Ok(ExpiryPolicy::AllowMissing),
        Some(other) => Err(ConfigError::invalid(
            "JWT_ALLOW_MISSING_EXP",
            format!("expected a boolean, got '{other}'"),
        )),
    }
}
