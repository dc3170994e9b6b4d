//! Request ID middleware for request tracing and correlation.
//!
//! Reuses an upstream proxy's `x-request-id` when it looks sane and generates
//! a UUID v4 otherwise. The ID is recorded in the current tracing span,
//! tagged on the Sentry scope and echoed in the response headers.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream request ID we accept.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Accept only short IDs of `[A-Za-z0-9._-]` so they are safe in log lines.
fn sanitize(value: &str) -> Option<&str> {
    let ok = !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    ok.then_some(value)
}

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(sanitize)
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_accepts_proxy_ids() {
        assert_eq!(sanitize("8a7c-41d2_x.1"), Some("8a7c-41d2_x.1"));
    }

    #[test]
    fn test_sanitize_rejects_injection_and_long_ids() {
        assert_eq!(sanitize("abc\ninjected"), None);
        assert_eq!(sanitize("a b"), None);
        assert_eq!(sanitize(""), None);
        assert_eq!(sanitize(&"a".repeat(MAX_REQUEST_ID_LEN + 1)), None);
    }
}
