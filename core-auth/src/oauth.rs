//! OAuth 2.0 redirect and authorization-code helpers
//!
//! # Overview
//!
//! - [`callback_url`] builds the `redirect_uri` registered for a provider
//! - [`build_authorization_url`] builds the URL a browser is sent to
//! - [`CodeExchanger`] trades an authorization code for the raw login token
//!
//! The flow is stateless. Nothing is stored between the redirect and the
//! callback, so no `state` parameter is issued or checked.

use bridge_traits::http::{HttpClient, HttpRequest};
use core_library::Provider;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{AuthError, Result};
use crate::types::ProviderKind;

/// `redirect_uri` for `provider_name`: `<base>/logincallback/<name>/`.
///
/// `base` should end with `/`, otherwise its last path segment is replaced.
pub fn callback_url(base: &Url, provider_name: &str) -> Result<Url> {
    base.join(&format!("logincallback/{}/", provider_name))
        .map_err(|e| AuthError::InvalidConfig(format!("Invalid callback URL: {}", e)))
}

/// Build the authorization request URL for `provider`.
///
/// Adds `client_id`, `redirect_uri` and `response_type=code`, then the
/// provider kind's scope parameters. A provider whose name is not a known
/// kind gets no extra parameters.
pub fn build_authorization_url(provider: &Provider, redirect_uri: &Url) -> Result<Url> {
    let mut url = Url::parse(&provider.authorization_url).map_err(|e| {
        AuthError::InvalidConfig(format!(
            "Invalid authorization URL for {}: {}",
            provider.name, e
        ))
    })?;

    let extra = ProviderKind::parse(&provider.name)
        .map(|kind| kind.authorization_params())
        .unwrap_or_default();

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("client_id", &provider.consumer_key);
        query.append_pair("redirect_uri", redirect_uri.as_str());
        query.append_pair("response_type", "code");
        for (key, value) in &extra {
            query.append_pair(key, value);
        }
    }

    debug!(provider = %provider.name, "Built authorization URL");
    Ok(url)
}

/// Exchanges authorization codes at a provider's token endpoint.
pub struct CodeExchanger {
    http_client: Arc<dyn HttpClient>,
}

impl CodeExchanger {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    /// Exchange `code` for the raw token used to verify the login.
    ///
    /// Returns the `id_token` for Google and the `access_token` for Facebook.
    /// Any failure is reported as "could not retrieve token".
    #[instrument(skip(self, provider, code, redirect_uri), fields(provider = %provider.name))]
    pub async fn exchange_code(
        &self,
        provider: &Provider,
        kind: ProviderKind,
        code: &str,
        redirect_uri: &Url,
    ) -> Result<String> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("client_id", provider.consumer_key.as_str()),
            ("client_secret", provider.consumer_secret.as_str()),
        ];

        let request = HttpRequest::post(provider.access_token_url.clone())
            .header("Accept", "application/json")
            .form(&params)
            .map_err(|e| {
                warn!(error = %e, "Failed to encode token request");
                AuthError::token_unavailable(&provider.name)
            })?;

        let response = self
            .http_client
            .execute(request)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| {
                warn!(error = %e, "Token endpoint request failed");
                AuthError::token_unavailable(&provider.name)
            })?;

        let body: Value = response.json().map_err(|e| {
            warn!(error = %e, "Token endpoint returned invalid JSON");
            AuthError::token_unavailable(&provider.name)
        })?;

        let field = kind.raw_token_field();
        match body.get(field).and_then(Value::as_str) {
            Some(token) if !token.is_empty() => {
                debug!(field, "Authorization code exchanged");
                Ok(token.to_string())
            }
            _ => {
                warn!(field, "Token endpoint response lacks the expected field");
                Err(AuthError::token_unavailable(&provider.name))
            }
        }
    }
}
