//! Request authentication.
//!
//! Protected handlers take an [`Authenticated`] extractor, which runs the
//! [`RequestAuthenticator`] against the `Authorization` header:
//!
//! - `Bearer <access token>`: signature, type and expiry only; no storage hit
//! - `Session <service token>`: signature, type and expiry, plus a live
//!   stored record whose own expiry has not passed
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use beaver_auth::middleware::{AuthState, Authenticated};
//!
//! async fn whoami(Authenticated(user): Authenticated) -> String {
//!     user.user_id.to_string()
//! }
//!
//! let app = Router::new()
//!     .route("/whoami", get(whoami))
//!     .with_state(auth_state);
//! ```

use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::device::DeviceFlowCoordinator;
use crate::error::AuthError;
use crate::provider::IdentityProviderClient;
use crate::rotation::TokenRotator;
use crate::service_tokens::ServiceAccessTokenManager;
use crate::session::SessionIssuer;
use crate::storage::{IdentityStore, RefreshTokenStore};
use crate::token::{TokenClaims, TokenCodec, TokenType};
use crate::types::{TokenKind, hash_token};
use crate::AuthResult;

// =============================================================================
// Authenticated Caller
// =============================================================================

/// Authorization scheme a credential was presented under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialScheme {
    Bearer,
    Session,
}

impl CredentialScheme {
    fn parse(scheme: &str) -> Option<Self> {
        if scheme.eq_ignore_ascii_case("bearer") {
            Some(Self::Bearer)
        } else if scheme.eq_ignore_ascii_case("session") {
            Some(Self::Session)
        } else {
            None
        }
    }
}

impl fmt::Display for CredentialScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer => write!(f, "Bearer"),
            Self::Session => write!(f, "Session"),
        }
    }
}

/// The caller behind a validated credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub scheme: CredentialScheme,
    /// Nonce of the presented token.
    pub token_id: String,
}

// =============================================================================
// Request Authenticator
// =============================================================================

/// Validates credentials on protected requests.
pub struct RequestAuthenticator {
    codec: Arc<TokenCodec>,
    store: Arc<dyn RefreshTokenStore>,
}

impl RequestAuthenticator {
    #[must_use]
    pub fn new(codec: Arc<TokenCodec>, store: Arc<dyn RefreshTokenStore>) -> Self {
        Self { codec, store }
    }

    /// Authenticates the raw `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if the header is absent or uses another scheme,
    /// and a credential error if the token does not validate.
    pub async fn authenticate(&self, authorization: Option<&str>) -> AuthResult<AuthenticatedUser> {
        let header = authorization
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AuthError::unauthorized("missing Authorization header"))?;

        let (scheme, token) = header
            .split_once(' ')
            .map(|(s, t)| (s, t.trim()))
            .ok_or_else(|| AuthError::unauthorized("unsupported authorization scheme"))?;

        let scheme = CredentialScheme::parse(scheme)
            .ok_or_else(|| AuthError::unauthorized("unsupported authorization scheme"))?;

        if token.is_empty() {
            return Err(AuthError::unauthorized("empty credential"));
        }

        match scheme {
            CredentialScheme::Bearer => self.authenticate_access(token),
            CredentialScheme::Session => self.authenticate_session(token).await,
        }
    }

    /// Validates an access token. Never touches storage.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` or `TokenExpired`.
    pub fn authenticate_access(&self, token: &str) -> AuthResult<AuthenticatedUser> {
        let claims = self.verify(token, TokenType::Access)?;
        Ok(AuthenticatedUser {
            user_id: claims.subject_id()?,
            scheme: CredentialScheme::Bearer,
            token_id: claims.jti,
        })
    }

    /// Validates a service token against its stored record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken`, `TokenExpired`, `TokenRevoked`, or `Storage`.
    pub async fn authenticate_session(&self, token: &str) -> AuthResult<AuthenticatedUser> {
        let claims = self.verify(token, TokenType::Session)?;
        let user_id = claims.subject_id()?;

        let record = self
            .store
            .find_by_hash(&hash_token(token))
            .await?
            .filter(|r| r.kind == TokenKind::Service && r.user_id == user_id)
            .ok_or_else(|| {
                tracing::debug!(jti = %claims.jti, "Session token has no live record");
                AuthError::TokenRevoked
            })?;

        if record.is_expired() {
            if let Err(e) = self.store.delete_by_id(record.id).await {
                tracing::warn!(error = %e, token_id = %record.id, "Failed to delete expired session token");
            }
            return Err(AuthError::TokenExpired);
        }

        Ok(AuthenticatedUser {
            user_id,
            scheme: CredentialScheme::Session,
            token_id: claims.jti,
        })
    }

    fn verify(&self, token: &str, expected: TokenType) -> AuthResult<TokenClaims> {
        let claims = self.codec.verify_as(token, expected).map_err(|e| {
            tracing::debug!(error = %e, "Failed to verify token");
            AuthError::from(e)
        })?;

        if claims.is_expired_at(OffsetDateTime::now_utc()) {
            tracing::debug!(jti = %claims.jti, "Token expired");
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }
}

// =============================================================================
// Auth State
// =============================================================================

/// Services shared by the auth extractor and the auth HTTP handlers.
#[derive(Clone)]
pub struct AuthState {
    pub authenticator: Arc<RequestAuthenticator>,
    pub device_flow: Arc<DeviceFlowCoordinator>,
    pub rotator: Arc<TokenRotator>,
    pub service_tokens: Arc<ServiceAccessTokenManager>,
    pub identities: Arc<dyn IdentityStore>,
}

impl AuthState {
    /// Wires every auth service from configuration and storage backends.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the secret or a lifetime is invalid.
    pub fn build(
        config: &AuthConfig,
        provider: Arc<dyn IdentityProviderClient>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        identities: Arc<dyn IdentityStore>,
    ) -> AuthResult<Self> {
        let secret = config
            .secret_bytes()
            .map_err(|e| AuthError::configuration(e.to_string()))?;
        let codec = Arc::new(
            TokenCodec::new(&secret, config.issuer.clone())
                .map_err(|e| AuthError::configuration(e.to_string()))?,
        );

        let issuer = Arc::new(SessionIssuer::from_config(
            codec.clone(),
            refresh_tokens.clone(),
            &config.tokens,
        )?);

        let device_flow = DeviceFlowCoordinator::new(
            provider,
            codec.clone(),
            identities.clone(),
            issuer.clone(),
        )
        .with_single_use_continuation(config.device_flow.single_use_continuation);

        Ok(Self {
            authenticator: Arc::new(RequestAuthenticator::new(
                codec.clone(),
                refresh_tokens.clone(),
            )),
            device_flow: Arc::new(device_flow),
            rotator: Arc::new(TokenRotator::new(
                codec.clone(),
                refresh_tokens.clone(),
                issuer,
            )),
            service_tokens: Arc::new(ServiceAccessTokenManager::from_config(
                codec,
                refresh_tokens,
                &config.tokens,
            )?),
            identities,
        })
    }
}

// =============================================================================
// Extractor
// =============================================================================

/// Extractor that rejects the request unless it carries a valid credential.
pub struct Authenticated(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);

        let header = match parts.headers.get(AUTHORIZATION) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| AuthError::unauthorized("unreadable Authorization header"))?,
            ),
            None => None,
        };

        let user = auth_state.authenticator.authenticate(header).await?;
        Ok(Self(user))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use crate::storage::MemoryAuthStorage;
    use crate::token::SECRET_LEN;
    use crate::types::Identity;
    use time::Duration;

    struct Fixture {
        codec: Arc<TokenCodec>,
        storage: Arc<MemoryAuthStorage>,
        authenticator: RequestAuthenticator,
        issuer: SessionIssuer,
        service_tokens: ServiceAccessTokenManager,
    }

    fn fixture() -> Fixture {
        let codec = Arc::new(TokenCodec::new(&[41u8; SECRET_LEN], "beaver_api").unwrap());
        let storage = Arc::new(MemoryAuthStorage::new());
        let config = TokenConfig::default();
        Fixture {
            authenticator: RequestAuthenticator::new(codec.clone(), storage.clone()),
            issuer: SessionIssuer::from_config(codec.clone(), storage.clone(), &config).unwrap(),
            service_tokens: ServiceAccessTokenManager::from_config(
                codec.clone(),
                storage.clone(),
                &config,
            )
            .unwrap(),
            codec,
            storage,
        }
    }

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            username: "octocat".to_string(),
            email: "octocat@github.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_bearer_access_token() {
        let f = fixture();
        let identity = identity();
        let pair = f.issuer.issue_session(&identity).await.unwrap();

        let header = format!("Bearer {}", pair.access_token);
        let user = f.authenticator.authenticate(Some(&header)).await.unwrap();
        assert_eq!(user.user_id, identity.id);
        assert_eq!(user.scheme, CredentialScheme::Bearer);
    }

    #[tokio::test]
    async fn test_scheme_is_case_insensitive() {
        let f = fixture();
        let token = f
            .codec
            .sign(TokenType::Access, Uuid::new_v4(), Duration::hours(1))
            .unwrap();

        let header = format!("bearer {token}");
        assert!(f.authenticator.authenticate(Some(&header)).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_or_unsupported_header() {
        let f = fixture();

        let err = f.authenticator.authenticate(None).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { .. }));

        let err = f
            .authenticator
            .authenticate(Some("Basic dXNlcjpwYXNz"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { .. }));

        let err = f.authenticator.authenticate(Some("Bearer")).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_expired_access_token() {
        let f = fixture();
        let token = f
            .codec
            .sign(TokenType::Access, Uuid::new_v4(), Duration::seconds(-1))
            .unwrap();

        let err = f.authenticator.authenticate_access(&token).unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let f = fixture();
        let pair = f.issuer.issue_session(&identity()).await.unwrap();

        let header = format!("Bearer {}", pair.refresh_token);
        let err = f.authenticator.authenticate(Some(&header)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));

        let header = format!("Session {}", pair.refresh_token);
        let err = f.authenticator.authenticate(Some(&header)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
    }

    #[tokio::test]
    async fn test_service_token_only_under_session_scheme() {
        let f = fixture();
        let user_id = Uuid::new_v4();
        let created = f.service_tokens.create(user_id, "ci", None).await.unwrap();

        let header = format!("Session {}", created.token);
        let user = f.authenticator.authenticate(Some(&header)).await.unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.scheme, CredentialScheme::Session);

        let header = format!("Bearer {}", created.token);
        let err = f.authenticator.authenticate(Some(&header)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
    }

    #[tokio::test]
    async fn test_revoked_service_token() {
        let f = fixture();
        let user_id = Uuid::new_v4();
        let created = f.service_tokens.create(user_id, "ci", None).await.unwrap();
        f.service_tokens.revoke(user_id, created.id).await.unwrap();

        let err = f
            .authenticator
            .authenticate_session(&created.token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenRevoked));
    }

    #[tokio::test]
    async fn test_stored_expiry_is_enforced() {
        let f = fixture();
        let user_id = Uuid::new_v4();
        let signed = f
            .codec
            .issue(TokenType::Session, user_id, Duration::hours(1))
            .unwrap();
        let mut record = crate::types::RefreshTokenRecord::for_token(
            user_id,
            &signed.token,
            &signed.claims,
            TokenKind::Service,
            Some("ci".to_string()),
        );
        record.expires_at = OffsetDateTime::now_utc() - Duration::seconds(1);
        f.storage.insert(&record).await.unwrap();

        let err = f
            .authenticator
            .authenticate_session(&signed.token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
        assert_eq!(f.storage.token_count(), 0);
    }
}
