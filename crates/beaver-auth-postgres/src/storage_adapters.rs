//! Arc-owning storage adapters.
//!
//! These wrap the lifetime-based storage types and own an `Arc<PgPool>`, so
//! they can be handed to the auth services as `Arc<dyn Store>`.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use beaver_auth::storage::{
    ContinuationClaim, IdentityStore, RefreshTokenStore, SessionMinter, SignIn,
};
use beaver_auth::types::{Identity, NewIdentity, RefreshTokenRecord, TokenKind};
use beaver_auth::{AuthError, AuthResult};

use crate::token::TokenStorage;
use crate::user::UserStorage;
use crate::{PgPool, StorageError};

fn to_auth_error(err: StorageError) -> AuthError {
    AuthError::storage(err.to_string())
}

// =============================================================================
// Arc-Owning Refresh Token Storage
// =============================================================================

/// Arc-owning PostgreSQL refresh token storage adapter.
#[derive(Clone)]
pub struct ArcRefreshTokenStorage {
    pool: Arc<PgPool>,
}

impl ArcRefreshTokenStorage {
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for ArcRefreshTokenStorage {
    async fn insert(&self, record: &RefreshTokenRecord) -> AuthResult<()> {
        TokenStorage::new(&self.pool)
            .insert(record)
            .await
            .map_err(to_auth_error)
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshTokenRecord>> {
        TokenStorage::new(&self.pool)
            .find_by_hash(token_hash)
            .await
            .map_err(to_auth_error)
    }

    async fn delete_by_id(&self, id: Uuid) -> AuthResult<bool> {
        TokenStorage::new(&self.pool)
            .delete_by_id(id)
            .await
            .map_err(to_auth_error)
    }

    async fn delete_by_hash(&self, token_hash: &str) -> AuthResult<bool> {
        TokenStorage::new(&self.pool)
            .delete_by_hash(token_hash)
            .await
            .map_err(to_auth_error)
    }

    async fn rotate(&self, old_id: Uuid, replacement: &RefreshTokenRecord) -> AuthResult<()> {
        TokenStorage::new(&self.pool)
            .rotate(old_id, replacement)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => AuthError::TokenRevoked,
                other => to_auth_error(other),
            })
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        offset: i64,
        limit: i64,
    ) -> AuthResult<Vec<RefreshTokenRecord>> {
        TokenStorage::new(&self.pool)
            .list_by_user(user_id, kind, offset, limit)
            .await
            .map_err(to_auth_error)
    }

    async fn count_by_user(&self, user_id: Uuid, kind: TokenKind) -> AuthResult<i64> {
        TokenStorage::new(&self.pool)
            .count_by_user(user_id, kind)
            .await
            .map_err(to_auth_error)
    }

    async fn delete_owned(&self, user_id: Uuid, id: Uuid, kind: TokenKind) -> AuthResult<bool> {
        TokenStorage::new(&self.pool)
            .delete_owned(user_id, id, kind)
            .await
            .map_err(to_auth_error)
    }
}

// =============================================================================
// Arc-Owning User Storage
// =============================================================================

/// Arc-owning PostgreSQL user storage adapter.
#[derive(Clone)]
pub struct ArcUserStorage {
    pool: Arc<PgPool>,
}

impl ArcUserStorage {
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for ArcUserStorage {
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<Identity>> {
        UserStorage::new(&self.pool)
            .find_by_id(id)
            .await
            .map_err(to_auth_error)
    }

    async fn upsert_with_session(
        &self,
        identity: &NewIdentity,
        claim: Option<ContinuationClaim<'_>>,
        mint: SessionMinter<'_>,
    ) -> AuthResult<SignIn> {
        UserStorage::new(&self.pool)
            .upsert_with_session(identity, claim, mint)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_become_auth_storage_errors() {
        let err = to_auth_error(StorageError::conflict("refresh token already exists"));
        assert!(matches!(err, AuthError::Storage { .. }));
        assert!(err.is_server_error());
    }
}
