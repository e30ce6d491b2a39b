//! Flow engine error types.

use thiserror::Error;

/// Result type alias for flow operations.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors raised by the flow engine.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The operating system RNG failed. Fatal to the request; codes
    /// must never be minted from a degraded entropy source.
    #[error("system RNG failure: {0}")]
    Rng(String),
}
