//! # Account Store
//!
//! Owns the SQLite database behind the login flow.
//!
//! ## Overview
//!
//! This crate manages:
//! - Schema migrations and connection pooling ([`db`])
//! - Providers, identity records, local users and session tokens ([`models`])
//! - Repository traits with SQLite implementations ([`repositories`])
//!
//! Every get-or-create the login flow relies on is atomic at this layer, so
//! callers never need to retry on a unique-constraint race.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{IdentityRecord, LocalUser, NewLocalUser, NewProvider, Provider, SessionToken};
