use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use idlink_infra::ResolveError;

/// Invalid input is reported as such; every other failure is one opaque
/// "resolution failed" outcome, with the details left to the logs.
pub fn resolve_error_to_response(err: ResolveError) -> axum::response::Response {
    match err {
        ResolveError::InvalidRequest(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_request", msg)
        }
        other => {
            tracing::error!(kind = other.kind(), error = %other, "identify failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "resolution_failed",
                "resolution failed",
            )
        }
    }
}

pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text())
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
    use super::*;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn invalid_request_keeps_its_message() {
        let response = resolve_error_to_response(ResolveError::InvalidRequest(
            "either email or phoneNumber must be provided".into(),
        ));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_request");
        assert_eq!(body["message"], "either email or phoneNumber must be provided");
    }

    #[tokio::test]
    async fn store_details_never_reach_the_client() {
        let response = resolve_error_to_response(ResolveError::IntegrityViolation(
            "store rejected write: violates foreign key constraint \"contacts_linked_id_fkey\"".into(),
        ));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "resolution_failed");
        assert_eq!(body["message"], "resolution failed");
        assert!(!body.to_string().contains("contacts_linked_id_fkey"));
    }
}
