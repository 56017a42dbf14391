//! User storage.
//!
//! Users are keyed by their provider login. Signing in again with the same
//! login keeps the id and refreshes the email.

use sqlx_core::executor::Executor;
use sqlx_core::query_as::query_as;
use sqlx_postgres::Postgres;
use uuid::Uuid;

use beaver_auth::storage::{ContinuationClaim, SessionMinter, SignIn};
use beaver_auth::types::{Identity, NewIdentity};
use beaver_auth::{AuthError, AuthResult};

use crate::continuation::consume_continuation;
use crate::token::insert_record;
use crate::{PgPool, StorageResult};

type UserTuple = (Uuid, String, String);

fn from_tuple(row: UserTuple) -> Identity {
    Identity {
        id: row.0,
        username: row.1,
        email: row.2,
    }
}

async fn upsert_user<'e, E>(executor: E, identity: &NewIdentity) -> StorageResult<Identity>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: UserTuple = query_as(
        r#"
        INSERT INTO users (id, username, email)
        VALUES ($1, $2, $3)
        ON CONFLICT (username) DO UPDATE
            SET email = EXCLUDED.email,
                updated_at = NOW()
        RETURNING id, username, email
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&identity.username)
    .bind(&identity.email)
    .fetch_one(executor)
    .await?;

    Ok(from_tuple(row))
}

// =============================================================================
// User Storage
// =============================================================================

/// User storage operations over a borrowed pool.
pub struct UserStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> UserStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Finds a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Identity>> {
        let row: Option<UserTuple> =
            query_as("SELECT id, username, email FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        Ok(row.map(from_tuple))
    }

    /// Claims the continuation (if any), upserts the user and stores a
    /// freshly minted session in one transaction.
    ///
    /// Dropping the returned future before it completes rolls back the
    /// claim, the user and the refresh record together.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the transaction fails, or whatever `mint` returns.
    pub async fn upsert_with_session(
        &self,
        identity: &NewIdentity,
        claim: Option<ContinuationClaim<'_>>,
        mint: SessionMinter<'_>,
    ) -> AuthResult<SignIn> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        if let Some(claim) = claim {
            let first_use =
                consume_continuation(&mut *tx, claim.continuation_hash, claim.expires_at)
                    .await
                    .map_err(|e| AuthError::storage(e.to_string()))?;
            if !first_use {
                // Dropping `tx` rolls back.
                return Ok(SignIn::AlreadyConsumed);
            }
        }

        let user = upsert_user(&mut *tx, identity)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;

        let minted = mint(&user)?;
        insert_record(&mut *tx, &minted.record)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;

        tx.commit().await.map_err(storage_error)?;
        Ok(SignIn::Completed {
            user,
            token_pair: minted.pair,
        })
    }
}

fn storage_error(err: sqlx_core::Error) -> AuthError {
    AuthError::storage(err.to_string())
}
