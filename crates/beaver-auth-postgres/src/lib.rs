//! PostgreSQL storage backend for Beaver auth.
//!
//! Provides persistent storage for:
//!
//! - Users (`users`)
//! - Refresh and service token hashes (`refresh_tokens`)
//! - Consumed device-flow continuations (`consumed_continuations`)
//!
//! Tables are created by the embedded migrations in [`migrations`].
//!
//! # Example
//!
//! ```ignore
//! use beaver_auth_postgres::{PoolConfig, PostgresAuthStorage, create_pool, migrations};
//!
//! let pool = create_pool(&PoolConfig::default()).await?;
//! migrations::run(&pool).await?;
//!
//! let storage = PostgresAuthStorage::new(Arc::new(pool));
//! let refresh_tokens = storage.refresh_token_store();
//! ```

mod continuation;
pub mod migrations;
pub mod pool;
pub mod storage_adapters;
pub mod token;
pub mod user;

use std::sync::Arc;

use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use pool::{PoolConfig, create_pool};
pub use storage_adapters::{ArcRefreshTokenStorage, ArcUserStorage};
pub use token::TokenStorage;
pub use user::UserStorage;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during auth storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Requested resource was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists (conflict).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid input data or an unreadable stored row.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StorageError {
    /// Create a `NotFound` error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns `true` if this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if this is a `Conflict` error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if this is a client error (4xx equivalent).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Conflict(_) | Self::InvalidInput(_)
        )
    }

    /// Returns `true` if this is a server error (5xx equivalent).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Migration(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Maps a unique violation to `Conflict`, anything else to `Database`.
pub(crate) fn map_unique_violation(err: sqlx_core::Error, what: &str) -> StorageError {
    if let sqlx_core::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return StorageError::conflict(format!("{what} already exists"));
    }
    StorageError::from(err)
}

// =============================================================================
// PostgreSQL Auth Storage
// =============================================================================

/// PostgreSQL storage backend for authentication data.
#[derive(Debug, Clone)]
pub struct PostgresAuthStorage {
    pool: Arc<PgPool>,
}

impl PostgresAuthStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get a reference to the Arc-wrapped pool.
    #[must_use]
    pub fn pool_arc(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }

    // -------------------------------------------------------------------------
    // Storage Accessors
    // -------------------------------------------------------------------------

    /// Get token storage operations.
    #[must_use]
    pub fn tokens(&self) -> TokenStorage<'_> {
        TokenStorage::new(&self.pool)
    }

    /// Get user storage operations.
    #[must_use]
    pub fn users(&self) -> UserStorage<'_> {
        UserStorage::new(&self.pool)
    }

    // -------------------------------------------------------------------------
    // Trait Object Accessors
    // -------------------------------------------------------------------------

    /// Refresh token store for the auth services.
    #[must_use]
    pub fn refresh_token_store(&self) -> ArcRefreshTokenStorage {
        ArcRefreshTokenStorage::new(self.pool_arc())
    }

    /// Identity store for the auth services.
    #[must_use]
    pub fn identity_store(&self) -> ArcUserStorage {
        ArcUserStorage::new(self.pool_arc())
    }
}

// =============================================================================
// Tests
// =============================================================================
