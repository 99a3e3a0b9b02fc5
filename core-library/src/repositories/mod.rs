//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations.
//!
//! ## Architecture
//!
//! - Traits define the interface the login core depends on
//! - SQLite implementations use sqlx for async database access
//! - Get-or-create operations are atomic: a unique constraint decides the
//!   winner, never a read followed by a separate write
//!
//! ## Available Repositories
//!
//! - `ProviderRepository` - Configured identity providers
//! - `IdentityRepository` - External identity records and first-login linking
//! - `UserRepository` - Local accounts
//! - `SessionTokenRepository` - One bearer token per user

pub mod identity;
pub mod provider;
pub mod session_token;
pub mod user;

pub use identity::{IdentityRepository, SqliteIdentityRepository};
pub use provider::{ProviderRepository, SqliteProviderRepository};
pub use session_token::{SessionTokenRepository, SqliteSessionTokenRepository};
pub use user::{SqliteUserRepository, UserRepository};
