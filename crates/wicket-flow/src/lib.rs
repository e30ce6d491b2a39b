//! Device-flow coordination engine for the Wicket proxy.
//!
//! This crate implements the state machine behind RFC 8628 device
//! authorization brokering:
//! - TTL-indexed in-memory store binding `device_code`, `user_code`,
//!   PKCE verifier and CSRF `state` together across request legs
//! - Cryptographic minting of all four opaque tokens
//! - RFC 7636 S256 challenge derivation
//!
//! It contains no HTTP types; the proxy crate drives it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod mint;
pub mod pkce;
pub mod records;
pub mod store;

pub use error::{FlowError, Result};
pub use records::{normalize_user_code, DeviceStatus, FlowRecord, StateRecord};
pub use store::FlowStore;
