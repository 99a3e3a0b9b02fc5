//! Service wiring: storage, provider seeding, HTTP clients and the router.

use axum::Router;
use bridge_desktop::ReqwestHttpClient;
use bridge_traits::http::HttpClient;
use core_auth::{AccountStores, LoginManager, LoginSettings, ProviderKind};
use core_library::db::{create_pool, DatabaseConfig};
use core_library::repositories::{
    ProviderRepository, SqliteIdentityRepository, SqliteProviderRepository,
    SqliteSessionTokenRepository,
};
use core_library::{NewProvider, Provider};
use core_runtime::config::{ProviderSeed, ServerConfig};
use core_runtime::events::{AuthEvent, EventBus, EventSeverity};
use provider_facebook::FacebookProfileClient;
use provider_google::GoogleProfileClient;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, ServiceError};
use crate::routes::{router, AppState};

/// Host-provided handles the service is built from.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub pool: SqlitePool,
}

impl CoreDependencies {
    pub fn new(http_client: Arc<dyn HttpClient>, pool: SqlitePool) -> Self {
        Self { http_client, pool }
    }
}

/// Assembled login service.
#[derive(Clone)]
pub struct CoreService {
    manager: Arc<LoginManager>,
    event_bus: EventBus,
}

impl CoreService {
    /// Seed providers from `config` and wire the login manager.
    pub async fn bootstrap(config: &ServerConfig, deps: CoreDependencies) -> Result<Self> {
        let providers = Arc::new(SqliteProviderRepository::new(deps.pool.clone()));
        let seeded = seed_providers(providers.as_ref(), &config.providers).await?;
        if seeded.is_empty() {
            warn!("No identity providers configured; every login will be rejected");
        }

        let stores = AccountStores {
            providers,
            identities: Arc::new(SqliteIdentityRepository::new(deps.pool.clone())),
            tokens: Arc::new(SqliteSessionTokenRepository::new(deps.pool)),
        };

        let event_bus = EventBus::default();
        let settings = LoginSettings::new(config.public_base_url.clone())
            .with_provider_timeout(config.http_timeout + config.connect_timeout);

        let http_client = deps.http_client;
        let manager = LoginManager::new(stores, event_bus.clone(), settings)
            .with_profile_client(Arc::new(GoogleProfileClient::new(Arc::clone(&http_client))))
            .with_profile_client(Arc::new(FacebookProfileClient::new(Arc::clone(
                &http_client,
            ))))
            .with_code_exchange(http_client);

        info!(
            providers = seeded.len(),
            base_url = %config.public_base_url,
            "Login service ready"
        );

        Ok(Self {
            manager: Arc::new(manager),
            event_bus,
        })
    }

    pub fn manager(&self) -> Arc<LoginManager> {
        Arc::clone(&self.manager)
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn router(&self) -> Router {
        router(AppState {
            manager: self.manager(),
        })
    }

    /// Serve the router on `listener` until the server stops.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let address = listener
            .local_addr()
            .map_err(|e| ServiceError::Bind(e.to_string()))?;
        info!(%address, "Listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| ServiceError::Serve(e.to_string()))
    }
}

/// Open the database and build a reqwest client from `config`, then bootstrap.
pub async fn bootstrap_server(config: &ServerConfig) -> Result<CoreService> {
    let pool = create_pool(DatabaseConfig::new(config.database_url.clone())).await?;
    let http_client = ReqwestHttpClient::with_timeouts(config.http_timeout, config.connect_timeout)
        .map_err(|e| ServiceError::InitializationFailed(e.to_string()))?;

    CoreService::bootstrap(config, CoreDependencies::new(Arc::new(http_client), pool)).await
}

/// Upsert one provider row per seed, with the kind's default endpoints.
///
/// # Errors
///
/// `InitializationFailed` for a seed whose name is not a known provider kind.
pub async fn seed_providers(
    repository: &dyn ProviderRepository,
    seeds: &[ProviderSeed],
) -> Result<Vec<Provider>> {
    let mut providers = Vec::with_capacity(seeds.len());

    for seed in seeds {
        let kind = ProviderKind::parse(&seed.name).ok_or_else(|| {
            ServiceError::InitializationFailed(format!("unknown provider kind: {}", seed.name))
        })?;
        let endpoints = kind.default_endpoints();

        let provider = repository
            .upsert(&NewProvider {
                name: seed.name.clone(),
                consumer_key: seed.consumer_key.clone(),
                consumer_secret: seed.consumer_secret.clone(),
                enabled: seed.enabled,
                authorization_url: endpoints.authorization_url.to_string(),
                access_token_url: endpoints.access_token_url.to_string(),
                profile_url: endpoints.profile_url.to_string(),
            })
            .await?;

        debug!(provider = %provider.name, enabled = provider.enabled, "Provider seeded");
        providers.push(provider);
    }

    Ok(providers)
}

/// Mirror login events into the log until the bus closes.
pub fn spawn_event_log(event_bus: &EventBus) -> JoinHandle<()> {
    let mut events = event_bus.subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event log fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &AuthEvent) {
    let (user_id, provider) = match event {
        AuthEvent::AccountCreated {
            user_id, provider, ..
        }
        | AuthEvent::SignedIn {
            user_id, provider, ..
        } => (Some(*user_id), Some(provider.as_str())),
        AuthEvent::TokenIssued { user_id, .. } => (Some(*user_id), None),
        AuthEvent::LoginFailed { provider, .. } => (None, provider.as_deref()),
    };

    match event.severity() {
        EventSeverity::Debug => debug!(target: "audit", ?user_id, ?provider, "{}", event.description()),
        EventSeverity::Info => info!(target: "audit", ?user_id, ?provider, "{}", event.description()),
        EventSeverity::Warning | EventSeverity::Error => {
            warn!(target: "audit", ?user_id, ?provider, "{}", event.description())
        }
    }
}
