//! Domain models for the account store.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// A configured external identity source (Google, Facebook, ...).
///
/// Rows are seeded at startup and read-only to the login flow.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Provider {
    pub id: i64,
    /// Unique lowercase name, e.g. `google`
    pub name: String,
    /// OAuth client id; Google identity tokens must carry it as `aud`
    pub consumer_key: String,
    #[serde(skip_serializing)]
    pub consumer_secret: String,
    pub enabled: bool,
    pub authorization_url: String,
    pub access_token_url: String,
    pub profile_url: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("enabled", &self.enabled)
            .field("authorization_url", &self.authorization_url)
            .field("access_token_url", &self.access_token_url)
            .field("profile_url", &self.profile_url)
            .finish()
    }
}

/// Values written by [`ProviderRepository::upsert`](crate::repositories::ProviderRepository::upsert).
#[derive(Clone, PartialEq, Eq)]
pub struct NewProvider {
    pub name: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub enabled: bool,
    pub authorization_url: String,
    pub access_token_url: String,
    pub profile_url: String,
}

impl NewProvider {
    /// Validate provider data
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Provider name cannot be empty".to_string());
        }
        if self.name != self.name.to_lowercase() {
            return Err("Provider name must be lowercase".to_string());
        }
        if self.consumer_key.trim().is_empty() {
            return Err("Consumer key cannot be empty".to_string());
        }
        Ok(())
    }
}

impl fmt::Debug for NewProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewProvider")
            .field("name", &self.name)
            .field("consumer_key", &self.consumer_key)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Link between an external identity and a local user.
///
/// Unique per `(provider_id, identifier)`. The stored token is replaced on
/// every login; `user_id` is set once and never changed by a login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct IdentityRecord {
    pub id: i64,
    pub provider_id: i64,
    /// External identifier, the provider's `id` after normalization
    pub identifier: String,
    /// Most recent raw provider token
    #[serde(skip_serializing)]
    pub access_token: String,
    pub user_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl IdentityRecord {
    pub fn is_linked(&self) -> bool {
        self.user_id.is_some()
    }
}

impl fmt::Debug for IdentityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRecord")
            .field("id", &self.id)
            .field("provider_id", &self.provider_id)
            .field("identifier", &self.identifier)
            .field("access_token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// This system's own account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LocalUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: i64,
}

/// Fields for a user about to be provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewLocalUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl NewLocalUser {
    pub fn validate(&self) -> Result<(), String> {
        if self.username.trim().is_empty() {
            return Err("Username cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Opaque bearer credential, exactly one per user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SessionToken {
    pub key: String,
    pub user_id: i64,
    pub created_at: i64,
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("key", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("created_at", &self.created_at)
            .finish()
    }
}
