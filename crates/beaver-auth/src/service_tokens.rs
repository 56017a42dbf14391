//! Long-lived service access tokens for non-interactive clients.
//!
//! Service tokens are `session`-typed JWTs backed by a stored record of kind
//! [`TokenKind::Service`]. They are accepted only under the `Session`
//! authorization scheme, and the raw value is returned exactly once.

use std::sync::Arc;

use time::Duration;
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::pagination::{Page, PageRequest};
use crate::session::to_ttl;
use crate::storage::RefreshTokenStore;
use crate::token::{TokenCodec, TokenType};
use crate::types::{CreatedServiceToken, RefreshTokenRecord, ServiceAccessToken, TokenKind};
use crate::{AuthError, AuthResult};

/// Longest accepted token name, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Issues, lists and revokes service access tokens.
pub struct ServiceAccessTokenManager {
    codec: Arc<TokenCodec>,
    store: Arc<dyn RefreshTokenStore>,
    default_ttl: Duration,
    max_ttl: Duration,
}

impl ServiceAccessTokenManager {
    #[must_use]
    pub fn new(
        codec: Arc<TokenCodec>,
        store: Arc<dyn RefreshTokenStore>,
        default_ttl: Duration,
        max_ttl: Duration,
    ) -> Self {
        Self {
            codec,
            store,
            default_ttl,
            max_ttl,
        }
    }

    /// Creates a manager with lifetimes taken from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a lifetime does not fit a signed duration.
    pub fn from_config(
        codec: Arc<TokenCodec>,
        store: Arc<dyn RefreshTokenStore>,
        config: &TokenConfig,
    ) -> AuthResult<Self> {
        Ok(Self::new(
            codec,
            store,
            to_ttl(config.service_token_lifetime)?,
            to_ttl(config.service_token_max_lifetime)?,
        ))
    }

    /// Issues a named token for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an empty or overlong name, or a lifetime
    /// outside `(0, max]`.
    pub async fn create(
        &self,
        user_id: Uuid,
        name: &str,
        ttl: Option<Duration>,
    ) -> AuthResult<CreatedServiceToken> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::invalid_request("name must not be empty"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(AuthError::invalid_request(format!(
                "name must be at most {MAX_NAME_LEN} characters"
            )));
        }

        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl <= Duration::ZERO || ttl > self.max_ttl {
            return Err(AuthError::invalid_request(format!(
                "expires_in must be between 1 and {} seconds",
                self.max_ttl.whole_seconds()
            )));
        }

        let signed = self.codec.issue(TokenType::Session, user_id, ttl)?;
        let record = RefreshTokenRecord::for_token(
            user_id,
            &signed.token,
            &signed.claims,
            TokenKind::Service,
            Some(name.to_string()),
        );
        self.store.insert(&record).await?;

        tracing::info!(user_id = %user_id, token_id = %record.id, "Service access token created");

        Ok(CreatedServiceToken {
            id: record.id,
            name: name.to_string(),
            token: signed.token,
            issued_at: record.issued_at,
            expires_at: record.expires_at,
        })
    }

    /// Lists `user_id`'s tokens, fetching the page and the total concurrently.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if either query fails.
    pub async fn list(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> AuthResult<Page<ServiceAccessToken>> {
        let page = page.normalized();
        let (records, total) = tokio::try_join!(
            self.store
                .list_by_user(user_id, TokenKind::Service, page.offset(), page.limit()),
            self.store.count_by_user(user_id, TokenKind::Service),
        )?;

        let items = records.into_iter().map(ServiceAccessToken::from).collect();
        Ok(Page::new(items, total, page))
    }

    /// Revokes token `token_id` if `user_id` owns it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the caller owns no such token.
    pub async fn revoke(&self, user_id: Uuid, token_id: Uuid) -> AuthResult<()> {
        let deleted = self
            .store
            .delete_owned(user_id, token_id, TokenKind::Service)
            .await?;
        if !deleted {
            return Err(AuthError::not_found(format!(
                "service access token {token_id}"
            )));
        }

        tracing::info!(user_id = %user_id, token_id = %token_id, "Service access token revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryAuthStorage;
    use crate::token::SECRET_LEN;
    use crate::types::hash_token;

    fn manager() -> (Arc<TokenCodec>, Arc<MemoryAuthStorage>, ServiceAccessTokenManager) {
        let codec = Arc::new(TokenCodec::new(&[31u8; SECRET_LEN], "beaver_api").unwrap());
        let storage = Arc::new(MemoryAuthStorage::new());
        let manager =
            ServiceAccessTokenManager::from_config(codec.clone(), storage.clone(), &TokenConfig::default())
                .unwrap();
        (codec, storage, manager)
    }

    #[tokio::test]
    async fn test_create_returns_session_token_once() {
        let (codec, storage, manager) = manager();
        let user = Uuid::new_v4();

        let created = manager.create(user, "  ci deploy  ", None).await.unwrap();
        assert_eq!(created.name, "ci deploy");
        assert_eq!(
            (created.expires_at - created.issued_at).whole_days(),
            90
        );

        let claims = codec.verify(&created.token).unwrap();
        assert_eq!(claims.token_type, TokenType::Session);
        assert_eq!(claims.subject_id().unwrap(), user);

        let record = storage
            .find_by_hash(&hash_token(&created.token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.kind, TokenKind::Service);
        assert_eq!(record.name.as_deref(), Some("ci deploy"));

        let listed = manager.list(user, PageRequest::default()).await.unwrap();
        let json = serde_json::to_value(&listed.items[0]).unwrap();
        assert!(json.get("token").is_none());
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let (_, _, manager) = manager();
        let user = Uuid::new_v4();

        let err = manager.create(user, "   ", None).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));

        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(manager.create(user, &long, None).await.is_err());

        let err = manager
            .create(user, "ci", Some(Duration::days(400)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));

        assert!(manager.create(user, "ci", Some(Duration::ZERO)).await.is_err());
        assert!(manager.create(user, "ci", Some(Duration::days(1))).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_empty() {
        let (_, _, manager) = manager();

        let page = manager
            .list(Uuid::new_v4(), PageRequest::default())
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 20);
    }

    #[tokio::test]
    async fn test_list_pages_and_excludes_others() {
        let (_, _, manager) = manager();
        let user = Uuid::new_v4();
        for i in 0..3 {
            manager.create(user, &format!("token-{i}"), None).await.unwrap();
        }
        manager.create(Uuid::new_v4(), "stranger", None).await.unwrap();

        let page = manager.list(user, PageRequest::new(1, 2)).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);

        let page = manager.list(user, PageRequest::new(2, 2)).await.unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_revoke_is_owner_scoped() {
        let (_, storage, manager) = manager();
        let owner = Uuid::new_v4();
        let created = manager.create(owner, "ci", None).await.unwrap();

        let err = manager.revoke(Uuid::new_v4(), created.id).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }));
        assert_eq!(storage.token_count(), 1);

        manager.revoke(owner, created.id).await.unwrap();
        assert_eq!(storage.token_count(), 0);

        let err = manager.revoke(owner, created.id).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }));
    }
}
