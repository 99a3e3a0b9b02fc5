//! # Google Provider
//!
//! Implements `ProfileClient` for Google sign-in.
//!
//! ## Overview
//!
//! The raw value handed over by a Google login is an identity token (JWT),
//! not an opaque access token. It is checked at the configured token
//! introspection endpoint (`tokeninfo` by default), and the `aud` claim must
//! equal the provider's consumer key. The `sub` claim is then exposed as `id`.

pub mod client;

pub use client::GoogleProfileClient;
