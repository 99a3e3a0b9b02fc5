//! Identity record repository
//!
//! Both write operations run inside a single transaction. SQLite serializes
//! writers, so two concurrent logins for the same identity cannot both create
//! a record or both link a user.

use crate::error::{is_unique_violation, LibraryError, Result};
use crate::models::{IdentityRecord, LocalUser, NewLocalUser};
use async_trait::async_trait;
use sqlx::{query, query_as, query_scalar, Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};

const RECORD_COLUMNS: &str =
    "id, provider_id, identifier, access_token, user_id, created_at, updated_at";

/// Access to external identity records.
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Look up the record for `(provider_id, identifier)`.
    async fn find(&self, provider_id: i64, identifier: &str) -> Result<Option<IdentityRecord>>;

    /// Get-or-create the record and store `access_token` on it.
    ///
    /// A new record is created unlinked. An existing record keeps its linked
    /// user and only has its token replaced. Returns the record and whether
    /// this call created it.
    async fn resolve_access(
        &self,
        provider_id: i64,
        identifier: &str,
        access_token: &str,
    ) -> Result<(IdentityRecord, bool)>;

    /// Create a user and link it to the record, unless the record is linked
    /// already.
    ///
    /// If another login linked a user first, the new user is discarded and the
    /// already-linked user is returned. The flag is `true` only when this call
    /// created and linked the user.
    async fn link_new_user(
        &self,
        record_id: i64,
        new_user: &NewLocalUser,
    ) -> Result<(LocalUser, bool)>;

    /// The user linked to `(provider_id, identifier)`, if any.
    async fn linked_user(&self, provider_id: i64, identifier: &str) -> Result<Option<LocalUser>>;

    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of IdentityRepository
pub struct SqliteIdentityRepository {
    pool: SqlitePool,
}

impl SqliteIdentityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn linked_user_of_record(&self, record_id: i64) -> Result<Option<LocalUser>> {
        let user = query_as::<_, LocalUser>(
            r#"
            SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.created_at
            FROM identity_records r
            JOIN local_users u ON u.id = r.user_id
            WHERE r.id = ?
            "#,
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

async fn insert_user(
    tx: &mut Transaction<'_, Sqlite>,
    new_user: &NewLocalUser,
    now: i64,
) -> std::result::Result<LocalUser, sqlx::Error> {
    let user_id = query(
        r#"
        INSERT INTO local_users (username, email, first_name, last_name, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(&new_user.first_name)
    .bind(&new_user.last_name)
    .bind(now)
    .execute(&mut **tx)
    .await?
    .last_insert_rowid();

    Ok(LocalUser {
        id: user_id,
        username: new_user.username.clone(),
        email: new_user.email.clone(),
        first_name: new_user.first_name.clone(),
        last_name: new_user.last_name.clone(),
        created_at: now,
    })
}

#[async_trait]
impl IdentityRepository for SqliteIdentityRepository {
    async fn find(&self, provider_id: i64, identifier: &str) -> Result<Option<IdentityRecord>> {
        let record = query_as::<_, IdentityRecord>(&format!(
            "SELECT {} FROM identity_records WHERE provider_id = ? AND identifier = ?",
            RECORD_COLUMNS
        ))
        .bind(provider_id)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn resolve_access(
        &self,
        provider_id: i64,
        identifier: &str,
        access_token: &str,
    ) -> Result<(IdentityRecord, bool)> {
        if identifier.is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "identifier".to_string(),
                message: "External identifier cannot be empty".to_string(),
            });
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        // The insert comes first so the transaction holds the write lock
        // before anything is read.
        let created = query(
            r#"
            INSERT INTO identity_records (
                provider_id, identifier, access_token, user_id, created_at, updated_at
            )
            VALUES (?, ?, ?, NULL, ?, ?)
            ON CONFLICT(provider_id, identifier) DO NOTHING
            "#,
        )
        .bind(provider_id)
        .bind(identifier)
        .bind(access_token)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if !created {
            query(
                r#"
                UPDATE identity_records
                SET access_token = ?, updated_at = ?
                WHERE provider_id = ? AND identifier = ?
                "#,
            )
            .bind(access_token)
            .bind(now)
            .bind(provider_id)
            .bind(identifier)
            .execute(&mut *tx)
            .await?;
        }

        let record = query_as::<_, IdentityRecord>(&format!(
            "SELECT {} FROM identity_records WHERE provider_id = ? AND identifier = ?",
            RECORD_COLUMNS
        ))
        .bind(provider_id)
        .bind(identifier)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            record_id = record.id,
            provider_id,
            created,
            linked = record.is_linked(),
            "Identity record resolved"
        );

        Ok((record, created))
    }

    async fn link_new_user(
        &self,
        record_id: i64,
        new_user: &NewLocalUser,
    ) -> Result<(LocalUser, bool)> {
        new_user.validate().map_err(|e| LibraryError::InvalidInput {
            field: "LocalUser".to_string(),
            message: e,
        })?;

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let user = match insert_user(&mut tx, new_user, now).await {
            Ok(user) => user,
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                // Same username means the same first token, so the likely
                // cause is a concurrent first login that already linked it.
                return match self.linked_user_of_record(record_id).await? {
                    Some(existing) => {
                        debug!(record_id, user_id = existing.id, "Record linked concurrently");
                        Ok((existing, false))
                    }
                    None => {
                        warn!(record_id, "Username already taken by an unrelated account");
                        Err(LibraryError::Conflict {
                            field: "username".to_string(),
                            message: "username is already taken".to_string(),
                        })
                    }
                };
            }
            Err(e) => return Err(e.into()),
        };

        let linked = query(
            "UPDATE identity_records SET user_id = ?, updated_at = ? WHERE id = ? AND user_id IS NULL",
        )
        .bind(user.id)
        .bind(now)
        .bind(record_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if linked {
            tx.commit().await?;
            info!(record_id, user_id = user.id, "New local user linked");
            return Ok((user, true));
        }

        tx.rollback().await?;

        let exists: Option<i64> = query_scalar("SELECT id FROM identity_records WHERE id = ?")
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(LibraryError::not_found("IdentityRecord", record_id));
        }

        let existing = self
            .linked_user_of_record(record_id)
            .await?
            .ok_or_else(|| LibraryError::not_found("LocalUser", format!("record {}", record_id)))?;

        debug!(record_id, user_id = existing.id, "Record already linked, new user discarded");
        Ok((existing, false))
    }

    async fn linked_user(&self, provider_id: i64, identifier: &str) -> Result<Option<LocalUser>> {
        let user = query_as::<_, LocalUser>(
            r#"
            SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.created_at
            FROM identity_records r
            JOIN local_users u ON u.id = r.user_id
            WHERE r.provider_id = ? AND r.identifier = ?
            "#,
        )
        .bind(provider_id)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM identity_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
