//! Local user repository

use crate::error::Result;
use crate::models::LocalUser;
use async_trait::async_trait;
use sqlx::{query_as, query_scalar, SqlitePool};

/// Read access to local accounts.
///
/// Users are only ever created through
/// [`IdentityRepository::link_new_user`](crate::repositories::IdentityRepository::link_new_user),
/// which links the account to its identity in the same transaction.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<LocalUser>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<LocalUser>>;

    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of UserRepository
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<LocalUser>> {
        let user = query_as::<_, LocalUser>(
            "SELECT id, username, email, first_name, last_name, created_at \
             FROM local_users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<LocalUser>> {
        let user = query_as::<_, LocalUser>(
            "SELECT id, username, email, first_name, last_name, created_at \
             FROM local_users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM local_users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
