use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use docvault_auth::{Role, require_role};
use docvault_core::{EntityId, TenantId};
use docvault_documents::DocumentCatalog;

use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/defaults", post(seed_defaults))
        .route("/:id", get(get_category).delete(delete_category))
}

/// Tenant of the caller, provided it holds at least `minimum`.
fn tenant_for(principal: &PrincipalContext, minimum: Role) -> Result<TenantId, axum::response::Response> {
    require_role(principal.principal(), &minimum).map_err(|e| errors::authz_error_to_response(&e))
}

fn parse_id(raw: &str) -> Result<EntityId, axum::response::Response> {
    raw.parse::<EntityId>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

pub async fn list_categories(
    Extension(catalog): Extension<Arc<DocumentCatalog>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    let tenant_id = match tenant_for(&principal, Role::viewer()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    let categories = match catalog.categories().list(tenant_id, query.order).await {
        Ok(rows) => rows,
        Err(e) => return errors::guard_error_to_response(e),
    };

    let mut out = Vec::with_capacity(categories.len());
    for category in &categories {
        match catalog.categories().count_related(category).await {
            Ok(count) => out.push(dto::CategoryResponse::from_category(category, Some(count))),
            Err(e) => return errors::guard_error_to_response(e),
        }
    }
    Json(out).into_response()
}

pub async fn create_category(
    Extension(catalog): Extension<Arc<DocumentCatalog>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateCategoryRequest>,
) -> axum::response::Response {
    let tenant_id = match tenant_for(&principal, Role::editor()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    match catalog.categories().create(tenant_id, body.into_category()).await {
        Ok(category) => (
            StatusCode::CREATED,
            Json(dto::CategoryResponse::from_category(&category, Some(0))),
        )
            .into_response(),
        Err(e) => errors::guard_error_to_response(e),
    }
}

pub async fn seed_defaults(
    Extension(catalog): Extension<Arc<DocumentCatalog>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let tenant_id = match tenant_for(&principal, Role::admin()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    match catalog.seed_default_categories(tenant_id).await {
        Ok(rows) => Json(
            rows.iter()
                .map(|c| dto::CategoryResponse::from_category(c, None))
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::guard_error_to_response(e),
    }
}

pub async fn get_category(
    Extension(catalog): Extension<Arc<DocumentCatalog>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let tenant_id = match tenant_for(&principal, Role::viewer()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let category = match catalog.categories().get_by_id(tenant_id, id).await {
        Ok(c) => c,
        Err(e) => return errors::guard_error_to_response(e),
    };
    match catalog.categories().count_related(&category).await {
        Ok(count) => Json(dto::CategoryResponse::from_category(&category, Some(count))).into_response(),
        Err(e) => errors::guard_error_to_response(e),
    }
}

pub async fn delete_category(
    Extension(catalog): Extension<Arc<DocumentCatalog>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let tenant_id = match tenant_for(&principal, Role::admin()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match catalog.categories().delete(tenant_id, id).await {
        Ok(associations) => Json(serde_json::json!({
            "id": id.to_string(),
            "associations_removed": associations,
        }))
        .into_response(),
        Err(e) => errors::guard_error_to_response(e),
    }
}
