use axum::http::{HeaderMap, HeaderName};
use uuid::Uuid;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Per-request context, inserted by the request middleware.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: Uuid,
}

impl RequestContext {
    pub fn new(request_id: Uuid) -> Self {
        Self { request_id }
    }

    /// Reuse the caller's `x-request-id` when it is a UUID; otherwise mint a
    /// time-ordered one.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let request_id = headers
            .get(&REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .unwrap_or_else(Uuid::now_v7);
        Self::new(request_id)
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }
}
