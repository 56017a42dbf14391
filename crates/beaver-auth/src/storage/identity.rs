//! User identity storage trait.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::{Identity, MintedSession, NewIdentity, TokenPair};

/// Mints a session for an identity inside a storage transaction.
pub type SessionMinter<'a> = &'a (dyn Fn(&Identity) -> AuthResult<MintedSession> + Send + Sync);

/// A device-flow continuation to mark as consumed together with a sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationClaim<'a> {
    /// SHA-256 hex of the continuation token.
    pub continuation_hash: &'a str,
    /// Embedded expiry; the mark may be pruned after this instant.
    pub expires_at: OffsetDateTime,
}

/// Outcome of [`IdentityStore::upsert_with_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignIn {
    /// The user was upserted and the session persisted.
    Completed { user: Identity, token_pair: TokenPair },
    /// The claimed continuation had already been consumed. Nothing was written.
    AlreadyConsumed,
}

/// Storage for user identities.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Finds a user by id.
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<Identity>>;

    /// In one transaction: marks `claim` as consumed (if given), upserts the
    /// user keyed by username, mints a session with `mint`, and stores the
    /// session's refresh record.
    ///
    /// The continuation mark is only visible once the whole transaction
    /// commits. If the returned future is dropped or any step fails, nothing
    /// is persisted and the continuation stays usable.
    async fn upsert_with_session(
        &self,
        identity: &NewIdentity,
        claim: Option<ContinuationClaim<'_>>,
        mint: SessionMinter<'_>,
    ) -> AuthResult<SignIn>;
}
