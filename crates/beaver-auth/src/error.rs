//! Authentication error types.
//!
//! Every failure raised by the device flow, token rotation, request
//! authentication and service token management is an [`AuthError`]. The HTTP
//! rendering lives in [`crate::middleware::error`].

use std::fmt;

use crate::token::CodecError;

/// Errors that can occur during authentication and token lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token is malformed, carries a bad signature, or has the wrong type.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The token's embedded or stored expiry has passed.
    #[error("Token expired")]
    TokenExpired,

    /// The token has no live record: it was rotated, revoked, or never issued.
    #[error("Token revoked")]
    TokenRevoked,

    /// The device-flow continuation token could not be opened.
    #[error("Invalid continuation: {message}")]
    InvalidContinuation {
        /// Description of why the continuation is invalid.
        message: String,
    },

    /// The request lacks usable authentication credentials.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of why the request is unauthorized.
        message: String,
    },

    /// The request is invalid or malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// The requested resource does not exist for this caller.
    #[error("Not found: {message}")]
    NotFound {
        /// Description of the missing resource.
        message: String,
    },

    /// The identity provider failed or could not be reached.
    #[error("Identity provider error: {provider} - {message}")]
    IdentityProvider {
        /// The identity provider name.
        provider: String,
        /// Description of the error.
        message: String,
    },

    /// An error occurred while storing or retrieving auth data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidContinuation` error.
    #[must_use]
    pub fn invalid_continuation(message: impl Into<String>) -> Self {
        Self::InvalidContinuation {
            message: message.into(),
        }
    }

    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new `IdentityProvider` error.
    #[must_use]
    pub fn identity_provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IdentityProvider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken { .. }
                | Self::TokenExpired
                | Self::TokenRevoked
                | Self::InvalidContinuation { .. }
                | Self::Unauthorized { .. }
                | Self::InvalidRequest { .. }
                | Self::NotFound { .. }
        )
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::IdentityProvider { .. }
                | Self::Storage { .. }
                | Self::Configuration { .. }
                | Self::Internal { .. }
        )
    }

    /// Returns `true` if the failure concerns a presented credential.
    ///
    /// Callers see all of these as the same "bad or expired credential".
    #[must_use]
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken { .. }
                | Self::TokenExpired
                | Self::TokenRevoked
                | Self::Unauthorized { .. }
        )
    }

    /// Returns `true` if retrying the same request later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::IdentityProvider { .. } | Self::Storage { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidToken { .. } => ErrorCategory::Token,
            Self::TokenExpired => ErrorCategory::Token,
            Self::TokenRevoked => ErrorCategory::Token,
            Self::InvalidContinuation { .. } => ErrorCategory::DeviceFlow,
            Self::Unauthorized { .. } => ErrorCategory::Authentication,
            Self::InvalidRequest { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::Validation,
            Self::IdentityProvider { .. } => ErrorCategory::Provider,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<CodecError> for AuthError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::InvalidOrTampered => Self::invalid_continuation(err.to_string()),
            CodecError::InvalidSignature | CodecError::Malformed { .. } => {
                Self::invalid_token(err.to_string())
            }
            CodecError::Encoding { .. } | CodecError::InvalidKey { .. } => {
                Self::internal(err.to_string())
            }
        }
    }
}

/// Categories of authentication errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing or unusable credentials.
    Authentication,
    /// Token validation failures.
    Token,
    /// Device-flow continuation failures.
    DeviceFlow,
    /// Request validation errors.
    Validation,
    /// Identity provider failures.
    Provider,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Token => write!(f, "token"),
            Self::DeviceFlow => write!(f, "device_flow"),
            Self::Validation => write!(f, "validation"),
            Self::Provider => write!(f, "provider"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::invalid_token("bad signature");
        assert_eq!(err.to_string(), "Invalid token: bad signature");

        let err = AuthError::identity_provider("github", "timed out");
        assert_eq!(
            err.to_string(),
            "Identity provider error: github - timed out"
        );

        assert_eq!(AuthError::TokenExpired.to_string(), "Token expired");
    }

    #[test]
    fn test_client_and_server_errors() {
        assert!(AuthError::TokenRevoked.is_client_error());
        assert!(AuthError::invalid_continuation("x").is_client_error());
        assert!(AuthError::not_found("x").is_client_error());
        assert!(!AuthError::TokenRevoked.is_server_error());

        assert!(AuthError::storage("db down").is_server_error());
        assert!(AuthError::identity_provider("github", "502").is_server_error());
        assert!(!AuthError::internal("x").is_client_error());
    }

    #[test]
    fn test_credential_errors() {
        assert!(AuthError::invalid_token("x").is_credential_error());
        assert!(AuthError::TokenExpired.is_credential_error());
        assert!(AuthError::TokenRevoked.is_credential_error());
        assert!(!AuthError::invalid_request("x").is_credential_error());
    }

    #[test]
    fn test_retryable() {
        assert!(AuthError::identity_provider("github", "x").is_retryable());
        assert!(!AuthError::TokenExpired.is_retryable());
    }

    #[test]
    fn test_codec_error_conversion() {
        let err: AuthError = CodecError::InvalidOrTampered.into();
        assert!(matches!(err, AuthError::InvalidContinuation { .. }));

        let err: AuthError = CodecError::InvalidSignature.into();
        assert!(matches!(err, AuthError::InvalidToken { .. }));

        let err: AuthError = CodecError::malformed("garbage").into();
        assert!(matches!(err, AuthError::InvalidToken { .. }));

        let err: AuthError = CodecError::encoding("boom").into();
        assert!(err.is_server_error());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(AuthError::TokenExpired.category(), ErrorCategory::Token);
        assert_eq!(
            AuthError::identity_provider("github", "x").category(),
            ErrorCategory::Provider
        );
        assert_eq!(ErrorCategory::DeviceFlow.to_string(), "device_flow");
    }
}
