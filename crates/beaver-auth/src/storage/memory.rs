//! In-memory implementation of the auth storage traits.
//!
//! All state lives in process-local maps, so this backend only suits tests
//! and single-instance local runs. Every operation completes without awaiting
//! while holding a lock, which makes each call atomic.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::storage::{ContinuationClaim, IdentityStore, RefreshTokenStore, SessionMinter, SignIn};
use crate::types::{Identity, NewIdentity, RefreshTokenRecord, TokenKind};
use crate::{AuthError, AuthResult};

/// Process-local auth storage.
#[derive(Debug, Default)]
pub struct MemoryAuthStorage {
    users: RwLock<HashMap<Uuid, Identity>>,
    tokens: RwLock<HashMap<Uuid, RefreshTokenRecord>>,
    consumed: RwLock<HashMap<String, OffsetDateTime>>,
}

impl MemoryAuthStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored token records of any kind.
    pub fn token_count(&self) -> usize {
        read(&self.tokens).map(|t| t.len()).unwrap_or(0)
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        read(&self.users).map(|u| u.len()).unwrap_or(0)
    }

    /// Inserts or updates a user without a session.
    #[cfg(test)]
    pub(crate) fn seed_user(&self, identity: &NewIdentity) -> Identity {
        let mut users = self.users.write().unwrap();
        let merged = merge_identity(&users, identity);
        users.insert(merged.id, merged.clone());
        merged
    }
}

fn read<T>(lock: &RwLock<T>) -> AuthResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| AuthError::storage("in-memory storage lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> AuthResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| AuthError::storage("in-memory storage lock poisoned"))
}

fn insert_record(
    tokens: &mut HashMap<Uuid, RefreshTokenRecord>,
    record: &RefreshTokenRecord,
) -> AuthResult<()> {
    if tokens.values().any(|t| t.token_hash == record.token_hash) {
        return Err(AuthError::storage("token hash already exists"));
    }
    tokens.insert(record.id, record.clone());
    Ok(())
}

fn merge_identity(users: &HashMap<Uuid, Identity>, identity: &NewIdentity) -> Identity {
    match users.values().find(|u| u.username == identity.username) {
        Some(existing) => Identity {
            email: identity.email.clone(),
            ..existing.clone()
        },
        None => identity.clone().into_identity(),
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryAuthStorage {
    async fn insert(&self, record: &RefreshTokenRecord) -> AuthResult<()> {
        insert_record(&mut *write(&self.tokens)?, record)
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshTokenRecord>> {
        Ok(read(&self.tokens)?
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn delete_by_id(&self, id: Uuid) -> AuthResult<bool> {
        Ok(write(&self.tokens)?.remove(&id).is_some())
    }

    async fn delete_by_hash(&self, token_hash: &str) -> AuthResult<bool> {
        let mut tokens = write(&self.tokens)?;
        let before = tokens.len();
        tokens.retain(|_, t| t.token_hash != token_hash);
        Ok(tokens.len() != before)
    }

    async fn rotate(&self, old_id: Uuid, replacement: &RefreshTokenRecord) -> AuthResult<()> {
        let mut tokens = write(&self.tokens)?;
        let Some(old) = tokens.remove(&old_id) else {
            return Err(AuthError::TokenRevoked);
        };
        if let Err(e) = insert_record(&mut tokens, replacement) {
            tokens.insert(old.id, old);
            return Err(e);
        }
        Ok(())
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        offset: i64,
        limit: i64,
    ) -> AuthResult<Vec<RefreshTokenRecord>> {
        let tokens = read(&self.tokens)?;
        let mut owned: Vec<RefreshTokenRecord> = tokens
            .values()
            .filter(|t| t.user_id == user_id && t.kind == kind)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.issued_at.cmp(&a.issued_at).then(a.id.cmp(&b.id)));

        Ok(owned
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn count_by_user(&self, user_id: Uuid, kind: TokenKind) -> AuthResult<i64> {
        let count = read(&self.tokens)?
            .values()
            .filter(|t| t.user_id == user_id && t.kind == kind)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn delete_owned(&self, user_id: Uuid, id: Uuid, kind: TokenKind) -> AuthResult<bool> {
        let mut tokens = write(&self.tokens)?;
        let owned = tokens
            .get(&id)
            .is_some_and(|t| t.user_id == user_id && t.kind == kind);
        if owned {
            tokens.remove(&id);
        }
        Ok(owned)
    }
}

#[async_trait]
impl IdentityStore for MemoryAuthStorage {
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<Identity>> {
        Ok(read(&self.users)?.get(&id).cloned())
    }

    async fn upsert_with_session(
        &self,
        identity: &NewIdentity,
        claim: Option<ContinuationClaim<'_>>,
        mint: SessionMinter<'_>,
    ) -> AuthResult<SignIn> {
        // Lock order: users, tokens, consumed.
        let mut users = write(&self.users)?;
        let mut tokens = write(&self.tokens)?;
        let mut consumed = write(&self.consumed)?;

        if let Some(claim) = &claim {
            let now = OffsetDateTime::now_utc();
            consumed.retain(|_, exp| *exp > now);
            if consumed.contains_key(claim.continuation_hash) {
                return Ok(SignIn::AlreadyConsumed);
            }
        }

        let merged = merge_identity(&users, identity);
        let minted = mint(&merged)?;
        insert_record(&mut tokens, &minted.record)?;

        users.insert(merged.id, merged.clone());
        if let Some(claim) = claim {
            consumed.insert(claim.continuation_hash.to_string(), claim.expires_at);
        }

        Ok(SignIn::Completed {
            user: merged,
            token_pair: minted.pair,
        })
    }
}
