//! Login orchestration
//!
//! [`LoginManager`] drives one [`LoginAttempt`] per request:
//!
//! 1. Look up the named provider, rejecting unknown or disabled ones
//! 2. Take the raw token from the callback, or exchange the authorization code
//! 3. Verify the token with the provider's [`ProfileClient`]
//! 4. Get-or-create the identity record and store the fresh token on it
//! 5. Reuse the linked user, or provision and link a new one
//! 6. Get-or-create the user's session token
//!
//! Each milestone and every failure is published on the [`EventBus`].
//! Provider calls are bounded by a timeout and never retried.
//!
//! # Example
//!
//! ```ignore
//! use core_auth::{AccountStores, LoginManager, LoginSettings};
//!
//! let manager = LoginManager::new(stores, event_bus, LoginSettings::new(base_url))
//!     .with_profile_client(google_client)
//!     .with_profile_client(facebook_client)
//!     .with_code_exchange(http_client);
//!
//! let outcome = manager.login_with_token("facebook", Some(raw_token)).await?;
//! println!("token: {}", outcome.token);
//! ```

use bridge_traits::http::HttpClient;
use core_library::repositories::{IdentityRepository, ProviderRepository, SessionTokenRepository};
use core_library::{LocalUser, Provider, SessionToken};
use core_runtime::events::{AuthEvent, EventBus};
use core_runtime::logging::redact_if_sensitive;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::account;
use crate::error::{AuthError, Result};
use crate::oauth::{build_authorization_url, callback_url, CodeExchanger};
use crate::profile::ProfileClient;
use crate::state::{LoginAttempt, LoginState};
use crate::types::{AuthenticatedUser, ProviderKind};

/// Default upper bound for a single provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

/// Storage the login flow depends on.
#[derive(Clone)]
pub struct AccountStores {
    pub providers: Arc<dyn ProviderRepository>,
    pub identities: Arc<dyn IdentityRepository>,
    pub tokens: Arc<dyn SessionTokenRepository>,
}

/// Settings for [`LoginManager`].
#[derive(Debug, Clone)]
pub struct LoginSettings {
    /// Base of every `redirect_uri`
    pub public_base_url: Url,
    /// Upper bound for a code exchange or profile fetch
    pub provider_timeout: Duration,
}

impl LoginSettings {
    /// A missing trailing slash is added so callback URLs keep the base path.
    pub fn new(mut public_base_url: Url) -> Self {
        if !public_base_url.path().ends_with('/') {
            let path = format!("{}/", public_base_url.path());
            public_base_url.set_path(&path);
        }
        Self {
            public_base_url,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_provider_timeout(mut self, provider_timeout: Duration) -> Self {
        self.provider_timeout = provider_timeout;
        self
    }
}

/// Query parameters accepted by the callback and token endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    /// Raw provider token presented directly
    pub token: Option<String>,
    /// Authorization code to exchange for a raw token
    pub code: Option<String>,
}

impl CallbackParams {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            code: None,
        }
    }

    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            token: None,
            code: Some(code.into()),
        }
    }

    // A direct token wins over a code. Empty values count as absent.
    fn credential(&self) -> Result<Credential<'_>> {
        fn non_empty(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.is_empty())
        }
        match (non_empty(&self.token), non_empty(&self.code)) {
            (Some(token), _) => Ok(Credential::Token(token)),
            (None, Some(code)) => Ok(Credential::Code(code)),
            (None, None) => Err(AuthError::MissingToken),
        }
    }
}

enum Credential<'a> {
    Token(&'a str),
    Code(&'a str),
}

/// Result of a successful provider login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Session token value handed back to the caller
    pub token: String,
    pub user: LocalUser,
    /// The identity record was created by this login
    pub first_login: bool,
    /// The local account was created by this login
    pub account_created: bool,
    /// The session token was created by this login
    pub token_created: bool,
}

/// Coordinates provider verification, account resolution and token issuance.
pub struct LoginManager {
    stores: AccountStores,
    clients: HashMap<ProviderKind, Arc<dyn ProfileClient>>,
    exchanger: Option<CodeExchanger>,
    event_bus: EventBus,
    settings: LoginSettings,
}

impl LoginManager {
    pub fn new(stores: AccountStores, event_bus: EventBus, settings: LoginSettings) -> Self {
        Self {
            stores,
            clients: HashMap::new(),
            exchanger: None,
            event_bus,
            settings,
        }
    }

    /// Register the verifier for one provider kind, replacing any earlier one.
    pub fn with_profile_client(mut self, client: Arc<dyn ProfileClient>) -> Self {
        self.clients.insert(client.kind(), client);
        self
    }

    /// Enable `code=` callbacks, exchanging codes over `http_client`.
    pub fn with_code_exchange(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.exchanger = Some(CodeExchanger::new(http_client));
        self
    }

    /// Provider kinds with a registered profile client.
    pub fn supported_kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.clients.keys().copied().collect();
        kinds.sort_by_key(|kind| kind.as_str());
        kinds
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Build the URL the browser is redirected to for `provider_name`.
    ///
    /// # Errors
    ///
    /// `ProviderUnknown` or `ProviderDisabled` when the provider cannot be used.
    #[instrument(skip(self))]
    pub async fn authorization_url(&self, provider_name: &str) -> Result<Url> {
        let mut attempt = LoginAttempt::redirect(provider_name);

        let result: Result<Url> = async {
            let provider = self.enabled_provider(provider_name).await?;
            let redirect_uri = callback_url(&self.settings.public_base_url, &provider.name)?;
            let url = build_authorization_url(&provider, &redirect_uri)?;
            attempt.advance(LoginState::AwaitingCallback)?;
            Ok(url)
        }
        .await;

        if let Err(e) = &result {
            attempt.fail(e.reason());
            self.report_failure(Some(provider_name), e, &attempt);
        }
        result
    }

    /// Log in with a raw provider token, as presented by the token endpoint.
    pub async fn login_with_token(
        &self,
        provider_name: &str,
        raw_token: Option<&str>,
    ) -> Result<LoginOutcome> {
        let params = CallbackParams {
            token: raw_token.map(str::to_string),
            code: None,
        };
        self.handle_callback(provider_name, &params).await
    }

    /// Handle a provider callback bearing either a raw token or a code.
    ///
    /// A request with neither fails with `MissingToken` before any network
    /// call is made.
    #[instrument(skip(self, params), fields(provider = %provider_name))]
    pub async fn handle_callback(
        &self,
        provider_name: &str,
        params: &CallbackParams,
    ) -> Result<LoginOutcome> {
        let mut attempt = LoginAttempt::callback(provider_name);
        let result = self.run_callback(&mut attempt, params).await;

        match &result {
            Ok(outcome) => {
                info!(
                    user_id = outcome.user.id,
                    username = %redact_if_sensitive("username", &outcome.user.username),
                    account_created = outcome.account_created,
                    elapsed_ms = attempt.elapsed_ms() as u64,
                    "Login completed"
                );
            }
            Err(e) => {
                attempt.fail(e.reason());
                self.report_failure(Some(provider_name), e, &attempt);
            }
        }
        result
    }

    /// Token for an already authenticated caller (the bare token endpoint).
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` when `user` is `None`; nothing is written.
    #[instrument(skip(self, user), fields(user_id = user.map(|u| u.user_id)))]
    pub async fn session_token(&self, user: Option<&AuthenticatedUser>) -> Result<String> {
        let Some(user) = user else {
            let error = AuthError::NotAuthenticated;
            self.report_failure(None, &error, &LoginAttempt::callback(""));
            return Err(error);
        };

        let (token, _) = self.issue_token(user.user_id).await?;
        Ok(token.key)
    }

    /// Resolve a presented session key to its owner.
    pub async fn authenticate(&self, key: &str) -> Result<Option<AuthenticatedUser>> {
        let user = self.stores.tokens.find_user_by_key(key).await?;
        Ok(user.as_ref().map(AuthenticatedUser::from))
    }

    async fn run_callback(
        &self,
        attempt: &mut LoginAttempt,
        params: &CallbackParams,
    ) -> Result<LoginOutcome> {
        let provider = self.enabled_provider(attempt.provider()).await?;
        let credential = params.credential()?;

        let kind = ProviderKind::parse(&provider.name)
            .ok_or_else(|| AuthError::UnsupportedProvider(provider.name.clone()))?;
        let client = self
            .clients
            .get(&kind)
            .cloned()
            .ok_or_else(|| AuthError::UnsupportedProvider(provider.name.clone()))?;

        attempt.advance(LoginState::Verifying)?;

        let raw_token = match credential {
            Credential::Token(token) => token.to_string(),
            Credential::Code(code) => self.exchange_code(&provider, kind, code).await?,
        };

        let profile = self
            .bounded(
                client.fetch_profile(&provider, &raw_token),
                AuthError::profile_unavailable(&provider.name),
            )
            .await?;
        let identifier = profile
            .id()
            .ok_or_else(|| AuthError::profile_unavailable(&provider.name))?;

        attempt.advance(LoginState::Resolving)?;

        let (record, first_login) = self
            .stores
            .identities
            .resolve_access(provider.id, &identifier, &raw_token)
            .await?;

        // Profile fields are copied only when the account is created; a
        // returning login refreshes the stored token and nothing else.
        let (user, account_created) = if record.is_linked() {
            let user = self
                .stores
                .identities
                .linked_user(provider.id, &identifier)
                .await?
                .ok_or_else(|| {
                    AuthError::Internal(format!("identity record {} lost its user", record.id))
                })?;
            (user, false)
        } else {
            let new_user = account::new_local_user(&profile, &raw_token);
            self.stores
                .identities
                .link_new_user(record.id, &new_user)
                .await?
        };

        if account_created {
            self.emit(AuthEvent::AccountCreated {
                user_id: user.id,
                username: user.username.clone(),
                provider: provider.name.clone(),
            });
        }
        self.emit(AuthEvent::SignedIn {
            user_id: user.id,
            provider: provider.name.clone(),
            first_login,
        });

        attempt.advance(LoginState::Issuing)?;
        let (token, token_created) = self.issue_token(user.id).await?;
        attempt.advance(LoginState::Done)?;

        Ok(LoginOutcome {
            token: token.key,
            user,
            first_login,
            account_created,
            token_created,
        })
    }

    async fn enabled_provider(&self, name: &str) -> Result<Provider> {
        let provider = self
            .stores
            .providers
            .find_by_name(name)
            .await?
            .ok_or_else(|| AuthError::ProviderUnknown(name.to_string()))?;

        if !provider.enabled {
            return Err(AuthError::ProviderDisabled(name.to_string()));
        }
        Ok(provider)
    }

    async fn exchange_code(
        &self,
        provider: &Provider,
        kind: ProviderKind,
        code: &str,
    ) -> Result<String> {
        let exchanger = self.exchanger.as_ref().ok_or_else(|| {
            AuthError::InvalidConfig("authorization code exchange is not configured".to_string())
        })?;
        let redirect_uri = callback_url(&self.settings.public_base_url, &provider.name)?;

        self.bounded(
            exchanger.exchange_code(provider, kind, code, &redirect_uri),
            AuthError::token_unavailable(&provider.name),
        )
        .await
    }

    async fn issue_token(&self, user_id: i64) -> Result<(SessionToken, bool)> {
        let (token, created) = self.stores.tokens.get_or_create(user_id).await?;
        debug!(user_id, created, "Session token issued");
        self.emit(AuthEvent::TokenIssued { user_id, created });
        Ok((token, created))
    }

    async fn bounded<T, F>(&self, call: F, on_timeout: AuthError) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match timeout(self.settings.provider_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    timeout_ms = self.settings.provider_timeout.as_millis() as u64,
                    "Provider call timed out"
                );
                Err(on_timeout)
            }
        }
    }

    fn report_failure(&self, provider: Option<&str>, error: &AuthError, attempt: &LoginAttempt) {
        let reason = error.reason();
        warn!(
            provider = provider.unwrap_or("-"),
            code = reason.code(),
            state = %attempt.state(),
            error = %error,
            "Login failed"
        );
        self.emit(AuthEvent::LoginFailed {
            provider: provider.map(str::to_string),
            code: reason.code().to_string(),
            message: error.to_string(),
        });
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is not an error for the login flow.
        let _ = self.event_bus.emit(event);
    }
}
