//! Refresh and service token storage.
//!
//! Rows in `refresh_tokens` hold only the SHA-256 hash of a token. Deleting a
//! row is what revokes the token.

use sqlx_core::executor::Executor;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::Postgres;
use time::OffsetDateTime;
use uuid::Uuid;

use beaver_auth::types::{RefreshTokenRecord, TokenKind};

use crate::{PgPool, StorageError, StorageResult, map_unique_violation};

type TokenTuple = (
    Uuid,
    Uuid,
    String,
    String,
    Option<String>,
    OffsetDateTime,
    OffsetDateTime,
);

const SELECT_COLUMNS: &str = "id, user_id, token_hash, kind, name, issued_at, expires_at";

fn from_tuple(row: TokenTuple) -> StorageResult<RefreshTokenRecord> {
    let kind = row
        .3
        .parse::<TokenKind>()
        .map_err(StorageError::invalid_input)?;
    Ok(RefreshTokenRecord {
        id: row.0,
        user_id: row.1,
        token_hash: row.2,
        kind,
        name: row.4,
        issued_at: row.5,
        expires_at: row.6,
    })
}

/// Inserts `record` through any executor, so callers can run it inside
/// their own transaction.
pub(crate) async fn insert_record<'e, E>(executor: E, record: &RefreshTokenRecord) -> StorageResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, kind, name, issued_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(record.id)
    .bind(record.user_id)
    .bind(&record.token_hash)
    .bind(record.kind.as_str())
    .bind(&record.name)
    .bind(record.issued_at)
    .bind(record.expires_at)
    .execute(executor)
    .await
    .map_err(|e| map_unique_violation(e, "refresh token"))?;

    Ok(())
}

// =============================================================================
// Token Storage
// =============================================================================

/// Token storage operations over a borrowed pool.
pub struct TokenStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> TokenStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Stores a new token record.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the hash or id is already present.
    pub async fn insert(&self, record: &RefreshTokenRecord) -> StorageResult<()> {
        insert_record(self.pool, record).await
    }

    /// Finds a token by the hash of its raw value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_hash(&self, token_hash: &str) -> StorageResult<Option<RefreshTokenRecord>> {
        let row: Option<TokenTuple> = query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM refresh_tokens WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        row.map(from_tuple).transpose()
    }

    /// Deletes a token by id. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_by_id(&self, id: Uuid) -> StorageResult<bool> {
        let result = query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes a token by hash. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_by_hash(&self, token_hash: &str) -> StorageResult<bool> {
        let result = query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replaces token `old_id` with `replacement` in one read-committed
    /// transaction.
    ///
    /// The delete must remove exactly the old row; if a concurrent rotation
    /// got there first nothing is inserted.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `old_id` is already gone, or a database error.
    /// The transaction is rolled back in both cases.
    pub async fn rotate(&self, old_id: Uuid, replacement: &RefreshTokenRecord) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await?;

        let deleted = query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(old_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted != 1 {
            return Err(StorageError::not_found(format!("RefreshToken {old_id}")));
        }

        insert_record(&mut *tx, replacement).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Lists a user's tokens of one kind, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_user(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        offset: i64,
        limit: i64,
    ) -> StorageResult<Vec<RefreshTokenRecord>> {
        let rows: Vec<TokenTuple> = query_as(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM refresh_tokens
            WHERE user_id = $1 AND kind = $2
            ORDER BY issued_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(user_id)
        .bind(kind.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(from_tuple).collect()
    }

    /// Counts a user's tokens of one kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_by_user(&self, user_id: Uuid, kind: TokenKind) -> StorageResult<i64> {
        let count: i64 =
            query_scalar("SELECT COUNT(*) FROM refresh_tokens WHERE user_id = $1 AND kind = $2")
                .bind(user_id)
                .bind(kind.as_str())
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }

    /// Deletes token `id` only if `user_id` owns it and it has `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_owned(&self, user_id: Uuid, id: Uuid, kind: TokenKind) -> StorageResult<bool> {
        let result =
            query("DELETE FROM refresh_tokens WHERE id = $1 AND user_id = $2 AND kind = $3")
                .bind(id)
                .bind(user_id)
                .bind(kind.as_str())
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
