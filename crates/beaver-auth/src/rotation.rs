//! Refresh token rotation.
//!
//! A refresh token is single-use: exchanging it deletes its record and stores
//! the replacement in the same transaction. Presenting the same token again
//! finds no record and fails.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::session::SessionIssuer;
use crate::storage::RefreshTokenStore;
use crate::token::{TokenCodec, TokenType};
use crate::types::{TokenKind, TokenPair, hash_token};
use crate::{AuthError, AuthResult};

/// Exchanges refresh tokens for new pairs.
pub struct TokenRotator {
    codec: Arc<TokenCodec>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    issuer: Arc<SessionIssuer>,
}

impl TokenRotator {
    #[must_use]
    pub fn new(
        codec: Arc<TokenCodec>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        issuer: Arc<SessionIssuer>,
    ) -> Self {
        Self {
            codec,
            refresh_tokens,
            issuer,
        }
    }

    /// Retires `refresh_token` and returns a replacement pair.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` if the signature, type or owner does not check out
    /// - `TokenExpired` if the embedded or stored expiry has passed
    /// - `TokenRevoked` if no live record exists (already rotated or revoked)
    /// - `Storage` if the transaction fails; nothing is changed then
    pub async fn rotate(&self, user_id: Uuid, refresh_token: &str) -> AuthResult<TokenPair> {
        let claims = self
            .codec
            .verify_as(refresh_token, TokenType::Refresh)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected refresh token");
                AuthError::from(e)
            })?;

        let now = OffsetDateTime::now_utc();
        if claims.is_expired_at(now) {
            tracing::debug!(jti = %claims.jti, "Refresh token expired");
            return Err(AuthError::TokenExpired);
        }

        let subject = claims.subject_id()?;
        if subject != user_id {
            tracing::debug!(jti = %claims.jti, "Refresh token presented for another user");
            return Err(AuthError::invalid_token("token subject does not match user"));
        }

        let token_hash = hash_token(refresh_token);
        let record = self
            .refresh_tokens
            .find_by_hash(&token_hash)
            .await?
            .filter(|r| r.kind == TokenKind::Refresh)
            .ok_or_else(|| {
                tracing::debug!(jti = %claims.jti, "Refresh token has no live record");
                AuthError::TokenRevoked
            })?;

        if record.user_id != user_id {
            return Err(AuthError::invalid_token("token record does not match user"));
        }

        if record.is_expired_at(now) {
            if let Err(e) = self.refresh_tokens.delete_by_id(record.id).await {
                tracing::warn!(error = %e, token_id = %record.id, "Failed to delete expired refresh token");
            }
            return Err(AuthError::TokenExpired);
        }

        let minted = self.issuer.mint_for(user_id)?;
        self.refresh_tokens.rotate(record.id, &minted.record).await?;

        tracing::info!(
            user_id = %user_id,
            old_token_id = %record.id,
            new_token_id = %minted.record.id,
            "Refresh token rotated"
        );

        Ok(minted.pair)
    }

    /// Deletes the record behind `refresh_token`. Idempotent.
    ///
    /// The signature must verify; expiry is not checked so an expired token
    /// can still be cleaned up.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` for a forged or non-refresh token.
    pub async fn revoke(&self, refresh_token: &str) -> AuthResult<()> {
        let claims = self.codec.verify_as(refresh_token, TokenType::Refresh)?;
        let deleted = self
            .refresh_tokens
            .delete_by_hash(&hash_token(refresh_token))
            .await?;

        tracing::info!(user_id = %claims.sub, deleted, "Refresh token revoked");
        Ok(())
    }
}
