//! Session issuance.
//!
//! [`SessionIssuer`] turns an authenticated identity into an access/refresh
//! token pair. The refresh token's hash is persisted before the pair is
//! returned; the access token is self-contained and never stored.

use std::sync::Arc;

use time::Duration;
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::storage::RefreshTokenStore;
use crate::token::{TokenCodec, TokenType};
use crate::types::{Identity, MintedSession, RefreshTokenRecord, TokenKind, TokenPair};
use crate::{AuthError, AuthResult};

/// Mints and persists access/refresh token pairs.
pub struct SessionIssuer {
    codec: Arc<TokenCodec>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionIssuer {
    /// Creates an issuer with explicit lifetimes.
    #[must_use]
    pub fn new(
        codec: Arc<TokenCodec>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            codec,
            refresh_tokens,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Creates an issuer with lifetimes taken from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a lifetime does not fit a signed duration.
    pub fn from_config(
        codec: Arc<TokenCodec>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        config: &TokenConfig,
    ) -> AuthResult<Self> {
        let access_ttl = to_ttl(config.access_token_lifetime)?;
        let refresh_ttl = to_ttl(config.refresh_token_lifetime())?;
        Ok(Self::new(codec, refresh_tokens, access_ttl, refresh_ttl))
    }

    /// Access token lifetime.
    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Refresh token lifetime.
    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Signs a new pair for `user_id` without persisting anything.
    ///
    /// The caller must store the returned record before handing out the pair.
    ///
    /// # Errors
    ///
    /// Returns an internal error if signing fails.
    pub fn mint_for(&self, user_id: Uuid) -> AuthResult<MintedSession> {
        let access = self.codec.issue(TokenType::Access, user_id, self.access_ttl)?;
        let refresh = self
            .codec
            .issue(TokenType::Refresh, user_id, self.refresh_ttl)?;

        let record = RefreshTokenRecord::for_token(
            user_id,
            &refresh.token,
            &refresh.claims,
            TokenKind::Refresh,
            None,
        );

        Ok(MintedSession {
            pair: TokenPair {
                access_token: access.token,
                refresh_token: refresh.token,
            },
            record,
        })
    }

    /// Signs a new pair for `identity` without persisting anything.
    ///
    /// # Errors
    ///
    /// Returns an internal error if signing fails.
    pub fn mint(&self, identity: &Identity) -> AuthResult<MintedSession> {
        self.mint_for(identity.id)
    }

    /// Mints a pair for `identity` and persists the refresh record.
    ///
    /// # Errors
    ///
    /// Returns an error if signing or storage fails; no pair is returned then.
    pub async fn issue_session(&self, identity: &Identity) -> AuthResult<TokenPair> {
        let minted = self.mint(identity)?;
        self.refresh_tokens.insert(&minted.record).await?;

        tracing::info!(user_id = %identity.id, "Session issued");
        Ok(minted.pair)
    }
}

/// Converts a configured lifetime into a signed token TTL.
pub(crate) fn to_ttl(lifetime: std::time::Duration) -> AuthResult<Duration> {
    Duration::try_from(lifetime)
        .map_err(|e| AuthError::configuration(format!("token lifetime out of range: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryAuthStorage;
    use crate::token::SECRET_LEN;
    use crate::types::hash_token;

    fn issuer(storage: Arc<MemoryAuthStorage>) -> SessionIssuer {
        let codec = Arc::new(TokenCodec::new(&[5u8; SECRET_LEN], "beaver_api").unwrap());
        SessionIssuer::from_config(codec, storage, &TokenConfig::default()).unwrap()
    }

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            username: "octocat".to_string(),
            email: "octocat@github.com".to_string(),
        }
    }

    #[test]
    fn test_default_lifetimes() {
        let issuer = issuer(Arc::new(MemoryAuthStorage::new()));
        assert_eq!(issuer.access_ttl(), Duration::days(7));
        assert_eq!(issuer.refresh_ttl(), Duration::days(28));
    }

    #[test]
    fn test_mint_does_not_persist() {
        let storage = Arc::new(MemoryAuthStorage::new());
        let issuer = issuer(storage.clone());

        let minted = issuer.mint(&identity()).unwrap();
        assert_ne!(minted.pair.access_token, minted.pair.refresh_token);
        assert_eq!(minted.record.token_hash, hash_token(&minted.pair.refresh_token));
        assert_eq!(minted.record.kind, TokenKind::Refresh);
        assert_eq!(storage.token_count(), 0);
    }

    #[tokio::test]
    async fn test_issue_session_persists_refresh_hash() {
        let storage = Arc::new(MemoryAuthStorage::new());
        let issuer = issuer(storage.clone());
        let identity = identity();

        let pair = issuer.issue_session(&identity).await.unwrap();

        let record = storage
            .find_by_hash(&hash_token(&pair.refresh_token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.user_id, identity.id);
        assert_eq!(
            (record.expires_at - record.issued_at).whole_seconds(),
            Duration::days(28).whole_seconds()
        );
        assert!(
            storage
                .find_by_hash(&hash_token(&pair.access_token))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_tokens_carry_expected_types() {
        let storage = Arc::new(MemoryAuthStorage::new());
        let codec = Arc::new(TokenCodec::new(&[5u8; SECRET_LEN], "beaver_api").unwrap());
        let issuer = SessionIssuer::new(
            codec.clone(),
            storage,
            Duration::hours(1),
            Duration::hours(4),
        );
        let identity = identity();

        let pair = issuer.issue_session(&identity).await.unwrap();

        let access = codec.verify(&pair.access_token).unwrap();
        assert_eq!(access.token_type, TokenType::Access);
        assert_eq!(access.exp - access.iat, 3600);
        assert_eq!(access.subject_id().unwrap(), identity.id);

        let refresh = codec.verify(&pair.refresh_token).unwrap();
        assert_eq!(refresh.token_type, TokenType::Refresh);
        assert_eq!(refresh.exp - refresh.iat, 4 * 3600);
    }
}
