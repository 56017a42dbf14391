//! Authentication configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth]
//! issuer = "beaver_api"
//! secret = "<base64 of 32 random bytes>"
//!
//! [auth.tokens]
//! access_token_lifetime = "7d"
//! refresh_token_multiplier = 4
//!
//! [auth.github]
//! client_id = "Iv1.0123456789abcdef"
//!
//! [auth.device_flow]
//! single_use_continuation = false
//! ```

use std::fmt;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::token::SECRET_LEN;

/// Root authentication configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Value of the `iss` claim on every token.
    pub issuer: String,

    /// Base64 (standard alphabet) encoding of the 32-byte process secret.
    pub secret: String,

    /// Token lifetimes.
    pub tokens: TokenConfig,

    /// GitHub device-flow client settings.
    pub github: GitHubConfig,

    /// Device flow behaviour.
    pub device_flow: DeviceFlowConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "beaver_api".to_string(),
            secret: String::new(),
            tokens: TokenConfig::default(),
            github: GitHubConfig::default(),
            device_flow: DeviceFlowConfig::default(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("issuer", &self.issuer)
            .field("secret", &"<redacted>")
            .field("tokens", &self.tokens)
            .field("github", &self.github)
            .field("device_flow", &self.device_flow)
            .finish()
    }
}

/// Token lifetime configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime as a multiple of the access token lifetime.
    pub refresh_token_multiplier: u32,

    /// Service token lifetime when the caller does not ask for one.
    #[serde(with = "humantime_serde")]
    pub service_token_lifetime: Duration,

    /// Longest service token lifetime a caller may ask for.
    #[serde(with = "humantime_serde")]
    pub service_token_max_lifetime: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: Duration::from_secs(7 * 24 * 3600), // 7 days
            refresh_token_multiplier: 4,
            service_token_lifetime: Duration::from_secs(90 * 24 * 3600), // 90 days
            service_token_max_lifetime: Duration::from_secs(365 * 24 * 3600), // 1 year
        }
    }
}

impl TokenConfig {
    /// Refresh token lifetime.
    #[must_use]
    pub fn refresh_token_lifetime(&self) -> Duration {
        self.access_token_lifetime
            .saturating_mul(self.refresh_token_multiplier)
    }
}

/// GitHub OAuth app settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// OAuth app client id.
    pub client_id: String,

    /// Requested scopes.
    pub scope: String,

    /// Timeout applied to every provider request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Device authorization endpoint.
    pub device_code_url: String,

    /// Token endpoint.
    pub access_token_url: String,

    /// REST API base URL.
    pub api_base_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            scope: "read:user user:email".to_string(),
            request_timeout: Duration::from_secs(10),
            device_code_url: "https://github.com/login/device/code".to_string(),
            access_token_url: "https://github.com/login/oauth/access_token".to_string(),
            api_base_url: "https://api.github.com".to_string(),
        }
    }
}

impl GitHubConfig {
    /// Points every endpoint at `base` (e.g. a mock server).
    #[must_use]
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.device_code_url = format!("{base}/login/device/code");
        self.access_token_url = format!("{base}/login/oauth/access_token");
        self.api_base_url = base.to_string();
        self
    }

    /// Sets the client id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Device flow settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceFlowConfig {
    /// When true, a continuation token yields at most one session.
    pub single_use_continuation: bool,
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Decodes the process secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is missing, not base64, or not
    /// exactly 32 bytes.
    pub fn secret_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        if self.secret.trim().is_empty() {
            return Err(ConfigError::Missing("auth.secret".to_string()));
        }
        let bytes = STANDARD
            .decode(self.secret.trim())
            .map_err(|e| ConfigError::InvalidValue(format!("auth.secret is not base64: {e}")))?;
        if bytes.len() != SECRET_LEN {
            return Err(ConfigError::InvalidValue(format!(
                "auth.secret must decode to {SECRET_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The issuer is empty
    /// - The secret is missing or not 32 bytes
    /// - A token lifetime is zero or the refresh multiplier is below 1
    /// - The GitHub client id is empty or an endpoint is not a URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::InvalidValue(
                "issuer cannot be empty".to_string(),
            ));
        }

        self.secret_bytes()?;

        if self.tokens.access_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "access_token_lifetime must be > 0".to_string(),
            ));
        }

        if self.tokens.refresh_token_multiplier < 1 {
            return Err(ConfigError::InvalidValue(
                "refresh_token_multiplier must be >= 1".to_string(),
            ));
        }

        if self.tokens.service_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "service_token_lifetime must be > 0".to_string(),
            ));
        }

        if self.tokens.service_token_lifetime > self.tokens.service_token_max_lifetime {
            return Err(ConfigError::InvalidValue(
                "service_token_lifetime must not exceed service_token_max_lifetime".to_string(),
            ));
        }

        if self.github.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("auth.github.client_id".to_string()));
        }

        if self.github.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "github.request_timeout must be > 0".to_string(),
            ));
        }

        for (field, value) in [
            ("github.device_code_url", &self.github.device_code_url),
            ("github.access_token_url", &self.github.access_token_url),
            ("github.api_base_url", &self.github.api_base_url),
        ] {
            Url::parse(value)
                .map_err(|e| ConfigError::InvalidValue(format!("{field} is not a URL: {e}")))?;
        }

        Ok(())
    }
}
