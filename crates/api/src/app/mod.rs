//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `routes/`: HTTP routes + handlers (one file per document kind)
//! - `dto.rs`: request extraction and response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;
use tracing::info;

use shopdocs_infra::store::StoreError;
use shopdocs_infra::{DocumentService, DocumentStore, InMemoryDocumentStore, PostgresDocumentStore};

use crate::config::Settings;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the document service over Postgres when `database_url` is set,
/// otherwise over the in-memory store.
pub async fn build_service(settings: &Settings) -> Result<DocumentService, StoreError> {
    let store: Arc<dyn DocumentStore> = match settings.database_url.as_deref() {
        Some(url) => {
            let store = PostgresDocumentStore::connect(url, settings.db_max_connections).await?;
            store.migrate().await?;
            info!("using postgres document store");
            Arc::new(store)
        }
        None => {
            info!("DATABASE_URL not configured; using in-memory document store");
            Arc::new(InMemoryDocumentStore::new())
        }
    };
    Ok(DocumentService::new(store, settings.service_settings()))
}

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(service: DocumentService, jwt_secret: &str) -> Router {
    let jwt = Arc::new(shopdocs_auth::Hs256JwtValidator::new(
        jwt_secret.as_bytes().to_vec(),
    ));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require a bearer token resolving to a caller.
    let protected = routes::router()
        .layer(Extension(service))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
