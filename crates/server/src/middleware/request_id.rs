//! Request correlation ids.
//!
//! An upstream `x-request-id` is trusted when it is short printable ASCII;
//! otherwise a UUID v4 is minted. The id is recorded on the tracing span,
//! tagged on the Sentry scope and echoed back in the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_UPSTREAM_ID_LEN: usize = 128;

/// Middleware that gives every request an id.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = upstream_id(request.headers().get(REQUEST_ID_HEADER))
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", request_id.as_str());
    sentry::configure_scope(|scope| scope.set_tag("request_id", &request_id));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn upstream_id(header: Option<&HeaderValue>) -> Option<String> {
    let value = header?.to_str().ok()?.trim();
    let usable = !value.is_empty()
        && value.len() <= MAX_UPSTREAM_ID_LEN
        && value.bytes().all(|b| b.is_ascii_graphic());
    usable.then(|| value.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_id_accepted() {
        let header = HeaderValue::from_static("cf-1234-abcd");
        assert_eq!(upstream_id(Some(&header)).as_deref(), Some("cf-1234-abcd"));
    }

    #[test]
    fn test_upstream_id_rejected() {
        assert!(upstream_id(None).is_none());
        assert!(upstream_id(Some(&HeaderValue::from_static("  "))).is_none());
        assert!(upstream_id(Some(&HeaderValue::from_static("has space"))).is_none());
        let long = HeaderValue::from_str(&"a".repeat(200)).expect("header");
        assert!(upstream_id(Some(&long)).is_none());
    }
}
