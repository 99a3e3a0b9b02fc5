//! Session token repository

use crate::error::Result;
use crate::models::{LocalUser, SessionToken};
use async_trait::async_trait;
use rand::RngCore;
use sqlx::{query, query_as, SqlitePool};
use tracing::debug;

/// Number of random bytes behind a session key (40 hex characters).
const KEY_BYTES: usize = 20;

/// One opaque bearer token per user.
#[async_trait]
pub trait SessionTokenRepository: Send + Sync {
    /// Return the user's token, creating it if it does not exist yet.
    ///
    /// The flag is `true` when this call created the token. Concurrent calls
    /// for the same user all return the same key.
    async fn get_or_create(&self, user_id: i64) -> Result<(SessionToken, bool)>;

    /// Resolve a presented key to its owner.
    async fn find_user_by_key(&self, key: &str) -> Result<Option<LocalUser>>;

    async fn find_by_user(&self, user_id: i64) -> Result<Option<SessionToken>>;
}

/// SQLite implementation of SessionTokenRepository
pub struct SqliteSessionTokenRepository {
    pool: SqlitePool,
}

impl SqliteSessionTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Generate a fresh session key: 20 random bytes, lowercase hex.
pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[async_trait]
impl SessionTokenRepository for SqliteSessionTokenRepository {
    async fn get_or_create(&self, user_id: i64) -> Result<(SessionToken, bool)> {
        let now = chrono::Utc::now().timestamp();

        let created = query(
            r#"
            INSERT INTO session_tokens (key, user_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(generate_key())
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected()
            == 1;

        let token = query_as::<_, SessionToken>(
            "SELECT key, user_id, created_at FROM session_tokens WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        debug!(user_id, created, "Session token resolved");
        Ok((token, created))
    }

    async fn find_user_by_key(&self, key: &str) -> Result<Option<LocalUser>> {
        let user = query_as::<_, LocalUser>(
            r#"
            SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.created_at
            FROM session_tokens t
            JOIN local_users u ON u.id = t.user_id
            WHERE t.key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Option<SessionToken>> {
        let token = query_as::<_, SessionToken>(
            "SELECT key, user_id, created_at FROM session_tokens WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::error::LibraryError;

    async fn insert_user(pool: &SqlitePool, username: &str) -> i64 {
        query("INSERT INTO local_users (username, created_at) VALUES (?, 0)")
            .bind(username)
            .execute(pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    #[test]
    fn test_generate_key_shape() {
        let key = generate_key();
        assert_eq!(key.len(), 40);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(key, generate_key());
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let pool = create_test_pool().await.unwrap();
        let user_id = insert_user(&pool, "alice").await;
        let repo = SqliteSessionTokenRepository::new(pool);

        let (first, created) = repo.get_or_create(user_id).await.unwrap();
        assert!(created);
        assert_eq!(first.user_id, user_id);

        let (second, created) = repo.get_or_create(user_id).await.unwrap();
        assert!(!created);
        assert_eq!(second.key, first.key);
    }

    #[tokio::test]
    async fn test_one_token_per_user() {
        let pool = create_test_pool().await.unwrap();
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let repo = SqliteSessionTokenRepository::new(pool);

        let (a, _) = repo.get_or_create(alice).await.unwrap();
        let (b, _) = repo.get_or_create(bob).await.unwrap();
        assert_ne!(a.key, b.key);

        let owner = repo.find_user_by_key(&b.key).await.unwrap().unwrap();
        assert_eq!(owner.username, "bob");
        assert!(repo.find_user_by_key("nope").await.unwrap().is_none());
        assert_eq!(repo.find_by_user(alice).await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn test_get_or_create_unknown_user_fails() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteSessionTokenRepository::new(pool);

        let result = repo.get_or_create(42).await;
        assert!(matches!(result, Err(LibraryError::Database(_))));
    }
}
