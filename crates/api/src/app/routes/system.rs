use axum::{http::StatusCode, response::IntoResponse, Json};

pub const BANNER: &str = "The server is running fine!!";

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Liveness banner on `/`.
pub async fn banner() -> impl IntoResponse {
    Json(serde_json::json!({ "message": BANNER }))
}
