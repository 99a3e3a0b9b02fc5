//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the login service crates:
//! - Server configuration (builder plus environment loading)
//! - Logging and tracing infrastructure
//! - Event bus for login lifecycle events
//!
//! ## Overview
//!
//! Nothing in here knows about identity providers or persistence. The other
//! crates depend on it for their configuration types, logging conventions and
//! the broadcast channel used to observe logins.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
