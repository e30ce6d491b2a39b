//! Proxy error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::problem::Problem;

/// Result type alias for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Errors raised outside a handler's validation path.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The upstream token exchange failed at the transport layer
    /// (DNS, connect, TLS, timeout, body read).
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// A configured upstream endpoint is not a valid URL.
    #[error("invalid upstream endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    /// Code minting failed.
    #[error(transparent)]
    Flow(#[from] wicket_flow::FlowError),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        Problem::new(StatusCode::INTERNAL_SERVER_ERROR)
            .with_detail(self.to_string())
            .into_response()
    }
}
