//! # Facebook Provider
//!
//! Implements `ProfileClient` for Facebook login.
//!
//! The raw token is a user access token, accepted as presented. It is sent
//! to the Graph `me` endpoint, which returns the profile fields the account
//! is provisioned from. Facebook already reports the external identifier as
//! `id`.

pub mod client;

pub use client::{FacebookProfileClient, PROFILE_FIELDS};
