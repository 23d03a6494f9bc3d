use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use docvault_auth::{AuthError, AuthzError};
use docvault_infra::GuardError;

/// Token failures answer 401 without saying which check failed; the reason
/// goes to the log only. An unreachable identity provider is a 503.
pub fn auth_error_to_response(err: &AuthError) -> axum::response::Response {
    tracing::info!(reason = err.kind(), "rejected bearer token");
    if err.is_unauthenticated() {
        json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "invalid or expired token")
    } else {
        json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "validation_unavailable",
            "token validation is temporarily unavailable",
        )
    }
}

pub fn authz_error_to_response(err: &AuthzError) -> axum::response::Response {
    match err {
        AuthzError::NoTenantScope => json_error(StatusCode::FORBIDDEN, "no_tenant_scope", err.to_string()),
        AuthzError::TenantMismatch => json_error(StatusCode::FORBIDDEN, "tenant_mismatch", err.to_string()),
        AuthzError::Forbidden(_) => json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
    }
}

pub fn guard_error_to_response(err: GuardError) -> axum::response::Response {
    let status = match &err {
        GuardError::NotFound { .. } => StatusCode::NOT_FOUND,
        GuardError::AlreadyExists { .. } | GuardError::SystemEntityProtected { .. } => StatusCode::CONFLICT,
        GuardError::Validation(_) => StatusCode::BAD_REQUEST,
        GuardError::Store(msg) => {
            tracing::error!(error = %msg, "storage failure");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, err.code(), "internal storage error");
        }
    };
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use docvault_core::DomainError;

    use super::*;

    #[test]
    fn guard_errors_map_to_statuses() {
        let cases = [
            (GuardError::NotFound { entity: "category" }, StatusCode::NOT_FOUND),
            (
                GuardError::AlreadyExists { entity: "category", key: "Invoices".into() },
                StatusCode::CONFLICT,
            ),
            (GuardError::SystemEntityProtected { entity: "category" }, StatusCode::CONFLICT),
            (GuardError::Validation(DomainError::validation("empty")), StatusCode::BAD_REQUEST),
            (GuardError::Store("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(guard_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn auth_errors_are_401_except_unavailable() {
        assert_eq!(
            auth_error_to_response(&AuthError::TokenExpired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            auth_error_to_response(&AuthError::InvalidSignature).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            auth_error_to_response(&AuthError::ValidationUnavailable("timeout".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
