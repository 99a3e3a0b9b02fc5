//! Google identity-token verification

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use core_auth::{AuthError, ProfileClient, ProfileInfo, ProviderKind, Result};
use core_library::Provider;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Query parameter carrying the identity token on introspection requests.
const ID_TOKEN_PARAM: &str = "id_token";

/// Verifies Google identity tokens.
///
/// # Example
///
/// ```ignore
/// use provider_google::GoogleProfileClient;
///
/// let client = GoogleProfileClient::new(http_client);
/// let profile = client.fetch_profile(&provider, id_token).await?;
/// assert!(profile.id().is_some());
/// ```
pub struct GoogleProfileClient {
    http_client: Arc<dyn HttpClient>,
}

impl GoogleProfileClient {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    /// Check the claims returned by introspection and normalize them.
    fn accept_claims(provider: &Provider, mut claims: ProfileInfo) -> Result<ProfileInfo> {
        match claims.get_str("aud") {
            Some(aud) if aud == provider.consumer_key => {}
            _ => {
                warn!(provider = %provider.name, "Identity token issued for another audience");
                return Err(AuthError::AudienceMismatch);
            }
        }

        if !claims.rename("sub", "id") {
            warn!(provider = %provider.name, "Token info lacks the sub claim");
            return Err(AuthError::profile_unavailable(&provider.name));
        }
        Ok(claims)
    }
}

#[async_trait]
impl ProfileClient for GoogleProfileClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    #[instrument(skip(self, provider, raw_token), fields(provider = %provider.name))]
    async fn fetch_profile(&self, provider: &Provider, raw_token: &str) -> Result<ProfileInfo> {
        if raw_token.is_empty() {
            return Err(AuthError::token_unavailable(&provider.name));
        }

        let request = HttpRequest::get(provider.profile_url.clone())
            .header("Accept", "application/json")
            .query(ID_TOKEN_PARAM, raw_token);

        let response = self
            .http_client
            .execute(request)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| {
                warn!(error = %e, "Token introspection failed");
                AuthError::profile_unavailable(&provider.name)
            })?;

        let claims: ProfileInfo = response.json().map_err(|e| {
            warn!(error = %e, "Token introspection returned invalid JSON");
            AuthError::profile_unavailable(&provider.name)
        })?;

        let profile = Self::accept_claims(provider, claims)?;
        debug!("Identity token verified");
        Ok(profile)
    }
}
