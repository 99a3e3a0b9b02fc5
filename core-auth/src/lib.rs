//! # Authentication Module
//!
//! Social login for the trip planner: a user proves who they are to an
//! external identity provider, and the module maps that identity to exactly
//! one local account with exactly one session token.
//!
//! ## Overview
//!
//! - [`LoginManager`] runs the redirect, callback and token flows
//! - [`ProfileClient`] is the per-provider verification seam; implementations
//!   live in the `provider-*` crates
//! - [`account`] derives the username of a new account from the raw token
//! - [`LoginAttempt`] tracks a single request through [`LoginState`]
//!
//! ## Failures
//!
//! Every error maps to a stable [`FailureReason`] code that the HTTP layer
//! turns into a status, and every failure is published as
//! `AuthEvent::LoginFailed` on the runtime event bus.

pub mod account;
pub mod error;
pub mod manager;
pub mod oauth;
pub mod profile;
pub mod state;
pub mod types;

pub use error::{AuthError, FailureReason, Result};
pub use manager::{
    AccountStores, CallbackParams, LoginManager, LoginOutcome, LoginSettings,
    DEFAULT_PROVIDER_TIMEOUT,
};
pub use oauth::{build_authorization_url, callback_url, CodeExchanger};
pub use profile::ProfileClient;
pub use state::{LoginAttempt, LoginState};
pub use types::{AuthenticatedUser, ProfileInfo, ProviderEndpoints, ProviderKind};
