//! # Host Bridge Traits
//!
//! Capability traits the login core needs from its host environment.
//!
//! ## Overview
//!
//! The login core never talks to the network directly. Outbound calls to
//! identity providers (profile endpoints, token introspection, code exchange)
//! go through the [`HttpClient`](http::HttpClient) trait so that tests can
//! substitute a mock and the server can inject a reqwest-backed client
//! (`bridge-desktop`).
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Implementations
//! should convert transport-specific errors into it and keep messages free of
//! credentials (query strings carrying tokens must not be echoed back).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so a single client can be
//! shared across request handlers.

pub mod error;
pub mod http;

pub use error::BridgeError;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
