use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::context::{PrincipalContext, TenantContext};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(principal): Extension<PrincipalContext>,
    tenant: Option<Extension<TenantContext>>,
) -> impl IntoResponse {
    let principal = principal.principal();
    Json(serde_json::json!({
        "subject_id": principal.subject_id().to_string(),
        "email": principal.email(),
        "tenant_id": tenant.map(|Extension(t)| t.tenant_id().to_string()),
        "role": principal.role().as_str(),
        "expires_at": principal.expires_at().map(|t| t.to_rfc3339()),
    }))
}
