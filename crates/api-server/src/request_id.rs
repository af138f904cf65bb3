use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::fmt;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request ID as seen by handlers, for correlating their log lines with the
/// `X-Request-Id` the client received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    fn from_headers(headers: &HeaderMap) -> Self {
        let id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reuses an incoming `X-Request-Id` or generates a UUID v4, records it on the
/// current span and echoes it back on the response.
pub async fn request_id_middleware(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let id = RequestId::from_headers(&headers);

    tracing::Span::current().record("request_id", id.as_str());

    let header_value = HeaderValue::from_str(id.as_str());
    request.extensions_mut().insert(id);

    let mut response = next.run(request).await;
    if let Ok(val) = header_value {
        response.headers_mut().insert(REQUEST_ID_HEADER, val);
    }

    response
}
