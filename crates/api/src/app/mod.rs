//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use anyhow::Context;
use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use docvault_auth::TokenValidator;
use docvault_documents::{DocumentCatalog, schema::SCHEMA};
use docvault_infra::{InMemoryDatabase, PostgresDatabase};

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Connects to Postgres and applies the schema when `DATABASE_URL` is set;
/// otherwise runs against an in-memory database.
pub async fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    let catalog = match &config.database_url {
        Some(url) => {
            let db = PostgresDatabase::connect(url)
                .await
                .context("failed to connect to Postgres")?;
            db.apply_schema(SCHEMA)
                .await
                .context("failed to apply document schema")?;
            tracing::info!("using Postgres document store");
            DocumentCatalog::postgres(db)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; documents are kept in memory");
            DocumentCatalog::in_memory(InMemoryDatabase::new())
        }
    };

    Ok(router(TokenValidator::new(config.validator.clone()), catalog))
}

/// Router over explicit collaborators (used by tests).
pub fn router(validator: TokenValidator, catalog: DocumentCatalog) -> Router {
    let auth_state = middleware::AuthState {
        validator: Arc::new(validator),
    };

    // Protected routes: require a valid bearer token.
    let protected = routes::router()
        .layer(Extension(Arc::new(catalog)))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
