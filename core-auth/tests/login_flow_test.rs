//! Login flow against SQLite account stores with mocked providers.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_auth::{
    AccountStores, AuthError, AuthenticatedUser, CallbackParams, LoginManager, LoginSettings,
    ProfileClient, ProfileInfo, ProviderKind,
};
use core_library::db::{create_pool, create_test_pool, DatabaseConfig};
use core_library::repositories::{
    SqliteIdentityRepository, SqliteProviderRepository, SqliteSessionTokenRepository,
    SqliteUserRepository, UserRepository,
};
use core_library::{NewProvider, Provider};
use core_runtime::events::{AuthEvent, EventBus};
use mockall::mock;
use std::sync::Arc;
use std::collections::HashSet;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

mock! {
    ProfileClient {}

    #[async_trait]
    impl ProfileClient for ProfileClient {
        fn kind(&self) -> ProviderKind;
        async fn fetch_profile(&self, provider: &Provider, raw_token: &str) -> core_auth::Result<ProfileInfo>;
    }
}

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

/// Never answers within the test timeout.
struct SlowProfileClient;

#[async_trait]
impl ProfileClient for SlowProfileClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn fetch_profile(&self, _: &Provider, _: &str) -> core_auth::Result<ProfileInfo> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(ProfileInfo::new().with("id", "late"))
    }
}

struct Harness {
    stores: AccountStores,
    users: Arc<dyn UserRepository>,
    events: EventBus,
    _dir: Option<TempDir>,
}

impl Harness {
    async fn new() -> Self {
        let pool = create_test_pool().await.unwrap();
        Self::with_pool(pool, None).await
    }

    /// File database shared by several connections, so logins really overlap.
    async fn on_disk(connections: u32) -> Self {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("accounts.db").display());
        let pool = create_pool(DatabaseConfig::new(url).max_connections(connections))
            .await
            .unwrap();
        Self::with_pool(pool, Some(dir)).await
    }

    async fn with_pool(pool: sqlx::SqlitePool, dir: Option<TempDir>) -> Self {
        let stores = AccountStores {
            providers: Arc::new(SqliteProviderRepository::new(pool.clone())),
            identities: Arc::new(SqliteIdentityRepository::new(pool.clone())),
            tokens: Arc::new(SqliteSessionTokenRepository::new(pool.clone())),
        };
        let users = Arc::new(SqliteUserRepository::new(pool));

        for kind in [ProviderKind::Facebook, ProviderKind::Google] {
            stores
                .providers
                .upsert(&seed(kind.as_str(), true))
                .await
                .unwrap();
        }

        Self {
            stores,
            users,
            events: EventBus::new(32),
            _dir: dir,
        }
    }

    fn manager(&self) -> LoginManager {
        LoginManager::new(
            self.stores.clone(),
            self.events.clone(),
            LoginSettings::new(Url::parse("https://trips.example.com/").unwrap())
                .with_provider_timeout(Duration::from_millis(200)),
        )
    }
}

fn seed(name: &str, enabled: bool) -> NewProvider {
    let endpoints = ProviderKind::parse(name)
        .unwrap_or(ProviderKind::Google)
        .default_endpoints();
    NewProvider {
        name: name.to_string(),
        consumer_key: format!("{}-client", name),
        consumer_secret: format!("{}-secret", name),
        enabled,
        authorization_url: endpoints.authorization_url.to_string(),
        access_token_url: endpoints.access_token_url.to_string(),
        profile_url: endpoints.profile_url.to_string(),
    }
}

fn facebook_client(times: usize) -> MockProfileClient {
    let mut client = MockProfileClient::new();
    client.expect_kind().return_const(ProviderKind::Facebook);
    client
        .expect_fetch_profile()
        .times(times)
        .returning(|_, _| {
            Ok(ProfileInfo::new()
                .with("id", "123")
                .with("first_name", "A")
                .with("last_name", "B")
                .with("email", "a@x.com"))
        });
    client
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<AuthEvent>) -> Vec<AuthEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_first_login_creates_account_and_token() {
    let harness = Harness::new().await;
    let mut rx = harness.events.subscribe();
    let manager = harness
        .manager()
        .with_profile_client(Arc::new(facebook_client(1)));

    let outcome = manager
        .login_with_token("facebook", Some("tok1"))
        .await
        .unwrap();

    assert!(outcome.first_login);
    assert!(outcome.account_created);
    assert!(outcome.token_created);
    assert_eq!(outcome.user.username, "a@x.com-brW0bFM");
    assert_eq!(outcome.user.email, "a@x.com");
    assert_eq!(outcome.user.first_name, "A");
    assert_eq!(outcome.user.last_name, "B");
    assert_eq!(outcome.token.len(), 40);

    let events = drain(&mut rx);
    assert!(matches!(events[0], AuthEvent::AccountCreated { .. }));
    assert!(matches!(
        events[1],
        AuthEvent::SignedIn {
            first_login: true,
            ..
        }
    ));
    assert!(matches!(
        events[2],
        AuthEvent::TokenIssued { created: true, .. }
    ));
}

#[tokio::test]
async fn test_returning_login_reuses_account_and_token() {
    let harness = Harness::new().await;
    let manager = harness
        .manager()
        .with_profile_client(Arc::new(facebook_client(2)));

    let first = manager
        .login_with_token("facebook", Some("tok1"))
        .await
        .unwrap();
    let second = manager
        .login_with_token("facebook", Some("tok2"))
        .await
        .unwrap();

    assert_eq!(first.user, second.user);
    assert_eq!(first.token, second.token);
    assert!(!second.first_login);
    assert!(!second.account_created);
    assert!(!second.token_created);
    // Username keeps the suffix of the token that created the account
    assert_eq!(second.user.username, "a@x.com-brW0bFM");

    let provider = harness
        .stores
        .providers
        .find_by_name("facebook")
        .await
        .unwrap()
        .unwrap();
    let record = harness
        .stores
        .identities
        .find(provider.id, "123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.access_token, "tok2");
    assert_eq!(harness.stores.identities.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_returning_login_keeps_original_profile_fields() {
    let harness = Harness::new().await;

    let mut client = MockProfileClient::new();
    client.expect_kind().return_const(ProviderKind::Facebook);
    let mut call = 0;
    client.expect_fetch_profile().times(2).returning(move |_, _| {
        call += 1;
        let first_name = if call == 1 { "Ala" } else { "Alicja" };
        Ok(ProfileInfo::new()
            .with("id", "123")
            .with("first_name", first_name)
            .with("last_name", "Kot"))
    });
    let manager = harness.manager().with_profile_client(Arc::new(client));

    manager.login_with_token("facebook", Some("tok1")).await.unwrap();
    let second = manager
        .login_with_token("facebook", Some("tok2"))
        .await
        .unwrap();

    assert_eq!(second.user.first_name, "Ala");
    assert_eq!(second.user.username, "-brW0bFM");
}

#[tokio::test]
async fn test_same_identifier_under_two_providers_gives_two_accounts() {
    let harness = Harness::new().await;

    let mut google = MockProfileClient::new();
    google.expect_kind().return_const(ProviderKind::Google);
    google
        .expect_fetch_profile()
        .times(1)
        .returning(|_, _| Ok(ProfileInfo::new().with("id", "123")));

    let manager = harness
        .manager()
        .with_profile_client(Arc::new(facebook_client(1)))
        .with_profile_client(Arc::new(google));

    let fb = manager
        .login_with_token("facebook", Some("tok1"))
        .await
        .unwrap();
    let gg = manager
        .login_with_token("google", Some("tok2"))
        .await
        .unwrap();

    assert_ne!(fb.user.id, gg.user.id);
    assert_ne!(fb.token, gg.token);
    assert_eq!(gg.user.username, "-EQKFG_8");
}

#[tokio::test]
async fn test_missing_token_fails_before_network() {
    let harness = Harness::new().await;
    let mut rx = harness.events.subscribe();
    let manager = harness
        .manager()
        .with_profile_client(Arc::new(facebook_client(0)));

    let result = manager.login_with_token("facebook", None).await;
    assert!(matches!(result, Err(AuthError::MissingToken)));

    let result = manager
        .handle_callback("facebook", &CallbackParams::default())
        .await;
    assert!(matches!(result, Err(AuthError::MissingToken)));

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    match &events[0] {
        AuthEvent::LoginFailed { provider, code, .. } => {
            assert_eq!(provider.as_deref(), Some("facebook"));
            assert_eq!(code, "MISSING_TOKEN");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_and_disabled_providers() {
    let harness = Harness::new().await;
    harness
        .stores
        .providers
        .upsert(&seed("facebook", false))
        .await
        .unwrap();
    let manager = harness
        .manager()
        .with_profile_client(Arc::new(facebook_client(0)));

    assert!(matches!(
        manager.login_with_token("myspace", Some("t")).await,
        Err(AuthError::ProviderUnknown(name)) if name == "myspace"
    ));
    assert!(matches!(
        manager.login_with_token("facebook", Some("t")).await,
        Err(AuthError::ProviderDisabled(_))
    ));
    assert!(matches!(
        manager.authorization_url("facebook").await,
        Err(AuthError::ProviderDisabled(_))
    ));
    assert!(matches!(
        manager.authorization_url("myspace").await,
        Err(AuthError::ProviderUnknown(_))
    ));
}

#[tokio::test]
async fn test_provider_without_client_is_unsupported() {
    let harness = Harness::new().await;
    harness
        .stores
        .providers
        .upsert(&seed("twitter", true))
        .await
        .unwrap();
    let manager = harness.manager();

    assert!(matches!(
        manager.login_with_token("twitter", Some("t")).await,
        Err(AuthError::UnsupportedProvider(_))
    ));
    // Google is seeded but has no registered client either
    assert!(matches!(
        manager.login_with_token("google", Some("t")).await,
        Err(AuthError::UnsupportedProvider(_))
    ));
    // The redirect still works with default parameters
    let url = manager.authorization_url("twitter").await.unwrap();
    assert!(url.query_pairs().any(|(k, v)| k == "client_id" && v == "twitter-client"));
}

#[tokio::test]
async fn test_profile_failure_writes_nothing() {
    let harness = Harness::new().await;
    let mut rx = harness.events.subscribe();

    let mut client = MockProfileClient::new();
    client.expect_kind().return_const(ProviderKind::Google);
    client
        .expect_fetch_profile()
        .times(1)
        .returning(|_, _| Err(AuthError::AudienceMismatch));
    let manager = harness.manager().with_profile_client(Arc::new(client));

    let result = manager.login_with_token("google", Some("foreign")).await;
    assert!(matches!(result, Err(AuthError::AudienceMismatch)));
    assert_eq!(harness.stores.identities.count().await.unwrap(), 0);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        AuthEvent::LoginFailed { code, .. } if code == "AUDIENCE_MISMATCH"
    ));
}

#[tokio::test]
async fn test_profile_without_identifier_fails() {
    let harness = Harness::new().await;
    let mut client = MockProfileClient::new();
    client.expect_kind().return_const(ProviderKind::Facebook);
    client
        .expect_fetch_profile()
        .returning(|_, _| Ok(ProfileInfo::new().with("email", "a@x.com")));
    let manager = harness.manager().with_profile_client(Arc::new(client));

    let result = manager.login_with_token("facebook", Some("tok1")).await;
    assert!(matches!(result, Err(AuthError::ProfileFetchFailed { .. })));
    assert_eq!(harness.stores.identities.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let harness = Harness::new().await;
    let manager = harness
        .manager()
        .with_profile_client(Arc::new(SlowProfileClient));

    let result = manager.login_with_token("google", Some("tok1")).await;
    match result {
        Err(AuthError::ProfileFetchFailed { provider, reason }) => {
            assert_eq!(provider, "google");
            assert_eq!(reason, "could not retrieve profile");
        }
        other => panic!("expected timeout failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_callback_with_code_exchanges_then_logs_in() {
    let harness = Harness::new().await;

    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|req| {
            req.url == "https://graph.facebook.com/oauth/access_token"
                && req
                    .body
                    .as_deref()
                    .map(|b| {
                        String::from_utf8_lossy(b).contains(
                            "redirect_uri=https%3A%2F%2Ftrips.example.com%2Flogincallback%2Ffacebook%2F",
                        )
                    })
                    .unwrap_or(false)
        })
        .times(1)
        .returning(|_| Ok(HttpResponse::new(200, r#"{"access_token":"tok1"}"#)));

    let mut client = MockProfileClient::new();
    client.expect_kind().return_const(ProviderKind::Facebook);
    client
        .expect_fetch_profile()
        .withf(|_, token| token == "tok1")
        .times(1)
        .returning(|_, _| Ok(ProfileInfo::new().with("id", "123").with("email", "a@x.com")));

    let manager = harness
        .manager()
        .with_profile_client(Arc::new(client))
        .with_code_exchange(Arc::new(http));

    let outcome = manager
        .handle_callback("facebook", &CallbackParams::with_code("auth-code"))
        .await
        .unwrap();
    assert_eq!(outcome.user.username, "a@x.com-brW0bFM");
}

#[tokio::test]
async fn test_callback_with_code_without_exchanger() {
    let harness = Harness::new().await;
    let manager = harness
        .manager()
        .with_profile_client(Arc::new(facebook_client(0)));

    let result = manager
        .handle_callback("facebook", &CallbackParams::with_code("auth-code"))
        .await;
    assert!(matches!(result, Err(AuthError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_session_token_for_authenticated_user() {
    let harness = Harness::new().await;
    let mut rx = harness.events.subscribe();
    let manager = harness
        .manager()
        .with_profile_client(Arc::new(facebook_client(1)));

    assert!(matches!(
        manager.session_token(None).await,
        Err(AuthError::NotAuthenticated)
    ));
    assert!(matches!(
        drain(&mut rx).as_slice(),
        [AuthEvent::LoginFailed { provider: None, code, .. }] if code == "NOT_AUTHENTICATED"
    ));

    let outcome = manager
        .login_with_token("facebook", Some("tok1"))
        .await
        .unwrap();
    let user = AuthenticatedUser::from(&outcome.user);

    let key = manager.session_token(Some(&user)).await.unwrap();
    assert_eq!(key, outcome.token);
    assert_eq!(manager.session_token(Some(&user)).await.unwrap(), key);

    assert_eq!(manager.authenticate(&key).await.unwrap(), Some(user));
    assert_eq!(manager.authenticate("not-a-key").await.unwrap(), None);
}

#[tokio::test]
async fn test_authorization_url_points_at_callback() {
    let harness = Harness::new().await;
    let manager = harness.manager();

    let url = manager.authorization_url("google").await.unwrap();
    assert!(url
        .as_str()
        .starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
    assert!(url.query_pairs().any(|(k, v)| k == "redirect_uri"
        && v == "https://trips.example.com/logincallback/google/"));
    assert!(url.query_pairs().any(|(k, v)| k == "client_id" && v == "google-client"));
}

#[tokio::test]
async fn test_concurrent_first_logins_create_one_account() {
    let harness = Harness::new().await;
    let manager = Arc::new(
        harness
            .manager()
            .with_profile_client(Arc::new(facebook_client(8))),
    );

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager.login_with_token("facebook", Some("tok1")).await
        }));
    }

    let mut tokens = Vec::new();
    for handle in handles {
        tokens.push(handle.await.unwrap().unwrap().token);
    }
    tokens.dedup();
    assert_eq!(tokens.len(), 1);
    assert_eq!(harness.stores.identities.count().await.unwrap(), 1);
}

/// Runs `tokens.len()` overlapping facebook logins, all for identifier "123".
async fn race_logins(harness: &Harness, tokens: Vec<String>) {
    let mut client = MockProfileClient::new();
    client.expect_kind().return_const(ProviderKind::Facebook);
    client.expect_fetch_profile().returning(|_, _| {
        Ok(ProfileInfo::new()
            .with("id", "123")
            .with("email", "a@x.com"))
    });
    let manager = Arc::new(harness.manager().with_profile_client(Arc::new(client)));

    let mut handles = Vec::new();
    for token in tokens {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager.login_with_token("facebook", Some(token.as_str())).await
        }));
    }

    let mut session_tokens = HashSet::new();
    let mut user_ids = HashSet::new();
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        session_tokens.insert(outcome.token);
        user_ids.insert(outcome.user.id);
    }

    assert_eq!(session_tokens.len(), 1);
    assert_eq!(user_ids.len(), 1);
    assert_eq!(harness.stores.identities.count().await.unwrap(), 1);
    assert_eq!(harness.users.count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_logins_same_token_on_shared_database() {
    let harness = Harness::on_disk(8).await;
    race_logins(&harness, vec!["tok1".to_string(); 24]).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_logins_distinct_tokens_on_shared_database() {
    let harness = Harness::on_disk(8).await;
    let tokens = (0..24).map(|i| format!("tok{}", i)).collect();
    race_logins(&harness, tokens).await;
}
