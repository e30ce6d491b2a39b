//! HTTP surface of the Wicket device-flow proxy.
//!
//! Exposes the RFC 8628 device authorization grant to constrained
//! clients and brokers each grant into an authorization-code + PKCE
//! exchange against an upstream OAuth 2.0 provider:
//! - `POST /device/code` and `POST /device/token` for the device
//! - `GET /device`, `GET /auth/verify_code`, `GET /auth/redirect` for
//!   the user's browser
//! - RFC 7807 problem responses on every error surface

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod extract;
pub mod pages;
pub mod problem;
pub mod routes;
pub mod upstream;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use routes::{create_router, AppState};
