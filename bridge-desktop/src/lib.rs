//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for server hosts.
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with request and connect timeouts and a
//!   single attempt per call
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::time::Duration;
//!
//! let http_client = ReqwestHttpClient::with_timeouts(
//!     Duration::from_secs(10),
//!     Duration::from_secs(5),
//! )?;
//! ```

mod http;

pub use http::ReqwestHttpClient;
