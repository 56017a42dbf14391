//! Refresh token storage trait.
//!
//! # Security Considerations
//!
//! - Tokens are stored as SHA-256 hashes only
//! - Rotation must retire the old record and create the new one atomically
//! - At most one record may exist per hash

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::{RefreshTokenRecord, TokenKind};

/// Storage for refresh and service token records.
///
/// Implementations are provided in separate crates:
/// - `beaver-auth-postgres` - PostgreSQL storage backend
///
/// [`MemoryAuthStorage`](super::MemoryAuthStorage) is an in-process
/// implementation for tests and local runs.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Stores a new record.
    ///
    /// # Errors
    ///
    /// Returns an error if the hash already exists or storage fails.
    async fn insert(&self, record: &RefreshTokenRecord) -> AuthResult<()>;

    /// Finds a record by token hash, regardless of its expiry.
    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshTokenRecord>>;

    /// Deletes a record by id. Returns `false` if nothing was deleted.
    async fn delete_by_id(&self, id: Uuid) -> AuthResult<bool>;

    /// Deletes a record by token hash. Returns `false` if nothing was deleted.
    async fn delete_by_hash(&self, token_hash: &str) -> AuthResult<bool>;

    /// Deletes `old_id` and inserts `replacement` in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `TokenRevoked` if `old_id` no longer exists, in which case
    /// `replacement` is not stored either.
    async fn rotate(&self, old_id: Uuid, replacement: &RefreshTokenRecord) -> AuthResult<()>;

    /// Lists a user's records of `kind`, newest first.
    async fn list_by_user(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        offset: i64,
        limit: i64,
    ) -> AuthResult<Vec<RefreshTokenRecord>>;

    /// Counts a user's records of `kind`.
    async fn count_by_user(&self, user_id: Uuid, kind: TokenKind) -> AuthResult<i64>;

    /// Deletes record `id` only if it belongs to `user_id` and is of `kind`.
    /// Returns `false` if nothing was deleted.
    async fn delete_owned(&self, user_id: Uuid, id: Uuid, kind: TokenKind) -> AuthResult<bool>;
}
