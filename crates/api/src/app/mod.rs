//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the identity resolver
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use idlink_infra::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router around already-built services.
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    Router::new()
        .route("/", get(routes::system::banner))
        .route("/health", get(routes::system::health))
        .nest("/api/v1", routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_context_middleware))
                .layer(Extension(services)),
        )
}

/// Build services from configuration, then the router (entrypoint used by `main.rs`).
pub async fn build_app_from_config(
    config: &AppConfig,
) -> Result<Router, idlink_infra::ContactStoreError> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(build_app(services))
}
