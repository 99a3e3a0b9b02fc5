//! Login service façade and bootstrap helpers.
//!
//! This crate wires the host implementations (reqwest HTTP client, SQLite
//! pool) and the provider clients into the login core, and exposes the
//! result as an axum [`Router`](axum::Router).
//!
//! ```ignore
//! use core_service::bootstrap_server;
//!
//! let service = bootstrap_server(&config).await?;
//! let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
//! service.serve(listener).await?;
//! ```

pub mod bootstrap;
pub mod error;
pub mod routes;

pub use bootstrap::{
    bootstrap_server, seed_providers, spawn_event_log, CoreDependencies, CoreService,
};
pub use error::{ErrorBody, Result, ServiceError};
pub use routes::{router, AppState, TokenResponse};
