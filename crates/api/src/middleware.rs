use std::time::Instant;

use axum::{http::HeaderValue, middleware::Next, response::Response};
use tracing::{info, info_span, Instrument};

use crate::context::{RequestContext, REQUEST_ID_HEADER};

/// Attach a [`RequestContext`], run the request inside a span carrying its id,
/// and echo the id back in `x-request-id`.
pub async fn request_context_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let ctx = RequestContext::from_headers(req.headers());
    req.extensions_mut().insert(ctx);

    let span = info_span!(
        "http_request",
        request_id = %ctx.request_id(),
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        let started = Instant::now();
        let mut response = next.run(req).await;

        info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&ctx.request_id().to_string()) {
            response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
        }
        response
    }
    .instrument(span)
    .await
}
