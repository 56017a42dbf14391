//! # beaver-auth
//!
//! Authentication and token lifecycle for the Beaver API.
//!
//! This crate provides:
//! - A stateless device authorization handshake against GitHub
//! - Signed access, refresh and session tokens, and sealed continuation tokens
//! - Refresh token rotation with server-side revocation
//! - Request authentication for `Bearer` and `Session` credentials
//! - Long-lived service access tokens
//!
//! ## Modules
//!
//! - [`token`] - Token signing, verification, sealing
//! - [`provider`] - Identity provider client
//! - [`device`] - Device flow coordination
//! - [`session`] - Session issuance
//! - [`rotation`] - Refresh token rotation and revocation
//! - [`service_tokens`] - Service access token management
//! - [`middleware`] - Request authentication for Axum
//! - [`http`] - Axum HTTP handlers
//! - [`storage`] - Storage traits for auth data

pub mod config;
pub mod device;
pub mod error;
pub mod http;
pub mod middleware;
pub mod pagination;
pub mod provider;
pub mod rotation;
pub mod service_tokens;
pub mod session;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{AuthConfig, ConfigError, DeviceFlowConfig, GitHubConfig, TokenConfig};
pub use device::{DeviceAuthorization, DeviceFlowCoordinator, PollResult, PollStatus};
pub use error::{AuthError, ErrorCategory};
pub use middleware::{AuthState, Authenticated, AuthenticatedUser, CredentialScheme, RequestAuthenticator};
pub use pagination::{Page, PageRequest};
pub use provider::{GitHubClient, IdentityProviderClient, PollOutcome};
pub use rotation::TokenRotator;
pub use service_tokens::ServiceAccessTokenManager;
pub use session::SessionIssuer;
pub use storage::{
    ContinuationClaim, IdentityStore, MemoryAuthStorage, RefreshTokenStore, SignIn,
};
pub use token::{TokenClaims, TokenCodec, TokenType};
pub use types::{
    CreatedServiceToken, Identity, NewIdentity, RefreshTokenRecord, ServiceAccessToken, Session,
    TokenKind, TokenPair,
};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;
