use axum::{routing::get, Router};

pub mod identify;
pub mod system;

/// Versioned API routes, nested under `/api/v1`.
pub fn router() -> Router {
    Router::new().route("/identify", get(identify::identify).post(identify::identify))
}
