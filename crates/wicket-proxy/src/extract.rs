//! Typed request-scope metadata.
//!
//! Replaces string-keyed context smuggling with a typed extractor: any
//! handler that wants the request id or client details takes a
//! [`RequestMeta`] argument.

use std::convert::Infallible;
use std::net::IpAddr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

/// Header carrying a caller-assigned request id, honored if present.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request metadata used for logging and tracing.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    /// Inbound `X-Request-Id`, or a freshly minted UUIDv4.
    pub request_id: String,
    /// Client IP as reported by proxy headers, if any.
    pub remote_ip: Option<IpAddr>,
    /// Inbound `User-Agent` header.
    pub user_agent: Option<String>,
    /// Inbound `Referer` header.
    pub referer: Option<String>,
}

impl RequestMeta {
    /// Builds metadata from request headers. Also used by the server's
    /// trace layer to stamp the per-request span.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let request_id = header_str(headers, REQUEST_ID_HEADER)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            request_id,
            remote_ip: client_ip_from_headers(headers),
            user_agent: header_str(headers, "user-agent").map(str::to_string),
            referer: header_str(headers, "referer").map(str::to_string),
        }
    }

    fn from_parts(parts: &Parts) -> Self {
        Self::from_headers(&parts.headers)
    }
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Extracts the client IP from forwarding headers.
fn client_ip_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    header_str(headers, "x-forwarded-for")
        .or_else(|| header_str(headers, "x-real-ip"))
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to build request Parts with given headers.
    fn make_parts(headers: Vec<(&str, &str)>) -> Parts {
        let mut builder = axum::http::Request::builder().method("GET").uri("/device");
        for (key, value) in headers {
            builder = builder.header(key, value);
        }
        let (parts, _body) = builder
            .body(())
            .expect("failed to build request")
            .into_parts();
        parts
    }

    #[test]
    fn test_honors_inbound_request_id() {
        let parts = make_parts(vec![("x-request-id", "req-123")]);
        let meta = RequestMeta::from_parts(&parts);
        assert_eq!(meta.request_id, "req-123");
    }

    #[test]
    fn test_mints_request_id_when_absent() {
        let parts = make_parts(vec![]);
        let meta = RequestMeta::from_parts(&parts);
        assert!(!meta.request_id.is_empty());
        assert!(uuid::Uuid::parse_str(&meta.request_id).is_ok());
    }

    #[test]
    fn test_forwarded_ip_first_hop_wins() {
        let parts = make_parts(vec![("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
        let meta = RequestMeta::from_parts(&parts);
        assert_eq!(meta.remote_ip, Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn test_client_details_captured() {
        let parts = make_parts(vec![
            ("user-agent", "curl/8.0"),
            ("referer", "https://localhost:8080/device"),
        ]);
        let meta = RequestMeta::from_parts(&parts);
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8.0"));
        assert_eq!(
            meta.referer.as_deref(),
            Some("https://localhost:8080/device")
        );
    }

    #[test]
    fn test_garbage_forwarded_header_ignored() {
        let parts = make_parts(vec![("x-forwarded-for", "not-an-ip")]);
        let meta = RequestMeta::from_parts(&parts);
        assert_eq!(meta.remote_ip, None);
    }
}
