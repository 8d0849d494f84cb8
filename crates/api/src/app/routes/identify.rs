use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use idlink_contacts::IdentifyRequest;

use crate::app::dto::{IdentifyRequestBody, IdentifyResponse};
use crate::app::errors;
use crate::app::services::AppServices;

/// `GET|POST /api/v1/identify` with a JSON body of `email` and/or `phoneNumber`.
pub async fn identify(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<IdentifyRequestBody>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let request = IdentifyRequest::from(body);
    match services.identify(&request).await {
        Ok(contact) => (StatusCode::OK, Json(IdentifyResponse { contact })).into_response(),
        Err(e) => errors::resolve_error_to_response(e),
    }
}
