//! Provider repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{NewProvider, Provider};
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};
use tracing::debug;

const PROVIDER_COLUMNS: &str = "id, name, consumer_key, consumer_secret, enabled, \
     authorization_url, access_token_url, profile_url, created_at, updated_at";

/// Provider repository interface
#[async_trait]
pub trait ProviderRepository: Send + Sync {
    /// Find a provider by its unique name, enabled or not.
    async fn find_by_name(&self, name: &str) -> Result<Option<Provider>>;

    /// Insert the provider or overwrite the row with the same name.
    ///
    /// The row id is preserved on update, so identity records stay attached.
    async fn upsert(&self, provider: &NewProvider) -> Result<Provider>;

    /// All providers ordered by name.
    async fn list(&self) -> Result<Vec<Provider>>;
}

/// SQLite implementation of ProviderRepository
pub struct SqliteProviderRepository {
    pool: SqlitePool,
}

impl SqliteProviderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProviderRepository for SqliteProviderRepository {
    async fn find_by_name(&self, name: &str) -> Result<Option<Provider>> {
        let provider = query_as::<_, Provider>(&format!(
            "SELECT {} FROM providers WHERE name = ?",
            PROVIDER_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(provider)
    }

    async fn upsert(&self, provider: &NewProvider) -> Result<Provider> {
        provider.validate().map_err(|e| LibraryError::InvalidInput {
            field: "Provider".to_string(),
            message: e,
        })?;

        let now = chrono::Utc::now().timestamp();
        query(
            r#"
            INSERT INTO providers (
                name, consumer_key, consumer_secret, enabled,
                authorization_url, access_token_url, profile_url,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                consumer_key = excluded.consumer_key,
                consumer_secret = excluded.consumer_secret,
                enabled = excluded.enabled,
                authorization_url = excluded.authorization_url,
                access_token_url = excluded.access_token_url,
                profile_url = excluded.profile_url,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&provider.name)
        .bind(&provider.consumer_key)
        .bind(&provider.consumer_secret)
        .bind(provider.enabled)
        .bind(&provider.authorization_url)
        .bind(&provider.access_token_url)
        .bind(&provider.profile_url)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(provider = %provider.name, enabled = provider.enabled, "Provider upserted");

        self.find_by_name(&provider.name)
            .await?
            .ok_or_else(|| LibraryError::not_found("Provider", &provider.name))
    }

    async fn list(&self) -> Result<Vec<Provider>> {
        let providers = query_as::<_, Provider>(&format!(
            "SELECT {} FROM providers ORDER BY name",
            PROVIDER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(providers)
    }
}
