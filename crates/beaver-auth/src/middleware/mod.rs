//! Axum integration for request authentication.
//!
//! - `Authorization` header parsing and credential validation
//! - the [`Authenticated`] extractor for protected handlers
//! - JSON error responses for [`crate::AuthError`]

pub mod auth;
pub mod error;

pub use auth::{AuthState, Authenticated, AuthenticatedUser, CredentialScheme, RequestAuthenticator};
pub use error::CREDENTIAL_ERROR_MESSAGE;
