//! Provider profile capability.

use async_trait::async_trait;
use core_library::Provider;

use crate::error::Result;
use crate::types::{ProfileInfo, ProviderKind};

/// Turns a provider-issued raw token into verified profile attributes.
///
/// Implementations live in the provider crates. They make at most one network
/// call per invocation, never retry, and convert every transport or parse
/// failure into [`AuthError::ProfileFetchFailed`](crate::AuthError::ProfileFetchFailed).
/// The returned profile always carries the external identifier under `id`.
#[async_trait]
pub trait ProfileClient: Send + Sync {
    /// Which provider kind this client verifies tokens for.
    fn kind(&self) -> ProviderKind;

    /// Validate `raw_token` against `provider` and fetch the profile.
    async fn fetch_profile(&self, provider: &Provider, raw_token: &str) -> Result<ProfileInfo>;
}
