//! Facebook Graph profile fetch

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use core_auth::{AuthError, ProfileClient, ProfileInfo, ProviderKind, Result};
use core_library::Provider;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Profile fields requested from the Graph API.
pub const PROFILE_FIELDS: &str = "id,first_name,last_name,email";

/// Fetches Facebook profiles with a user access token.
pub struct FacebookProfileClient {
    http_client: Arc<dyn HttpClient>,
}

impl FacebookProfileClient {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl ProfileClient for FacebookProfileClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Facebook
    }

    #[instrument(skip(self, provider, raw_token), fields(provider = %provider.name))]
    async fn fetch_profile(&self, provider: &Provider, raw_token: &str) -> Result<ProfileInfo> {
        if raw_token.is_empty() {
            return Err(AuthError::token_unavailable(&provider.name));
        }

        let request = HttpRequest::get(provider.profile_url.clone())
            .header("Accept", "application/json")
            .query("fields", PROFILE_FIELDS)
            .query("access_token", raw_token);

        let response = self
            .http_client
            .execute(request)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| {
                warn!(error = %e, "Profile request failed");
                AuthError::profile_unavailable(&provider.name)
            })?;

        let profile: ProfileInfo = response.json().map_err(|e| {
            warn!(error = %e, "Profile response is not a JSON object");
            AuthError::profile_unavailable(&provider.name)
        })?;

        debug!(has_email = profile.email().is_some(), "Profile fetched");
        Ok(profile)
    }
}
