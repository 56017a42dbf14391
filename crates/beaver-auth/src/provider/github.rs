//! GitHub implementation of the device authorization grant.
//!
//! Endpoints (overridable through [`GitHubConfig`]):
//!
//! - `POST https://github.com/login/device/code`
//! - `POST https://github.com/login/oauth/access_token`
//! - `GET https://api.github.com/user`
//! - `GET https://api.github.com/user/emails`

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{DeviceCode, IdentityProviderClient, PollOutcome, ProviderEmail, ProviderProfile};
use crate::config::GitHubConfig;
use crate::{AuthError, AuthResult};

const PROVIDER: &str = "github";
const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const GITHUB_JSON: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("beaver-api/", env!("CARGO_PKG_VERSION"));

/// Token endpoint response. GitHub reports pending states with HTTP 200 and
/// an `error` field.
#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl AccessTokenResponse {
    fn into_outcome(self) -> AuthResult<PollOutcome> {
        if let Some(token) = self.access_token.filter(|t| !t.is_empty()) {
            return Ok(PollOutcome::Granted(token));
        }

        match self.error.as_deref() {
            Some("authorization_pending") => Ok(PollOutcome::Pending),
            Some("slow_down") => Ok(PollOutcome::SlowDown),
            Some("expired_token") => Ok(PollOutcome::Expired),
            Some("access_denied") => Ok(PollOutcome::Denied),
            Some(code) => Err(AuthError::identity_provider(
                PROVIDER,
                format!(
                    "token endpoint returned {code}: {}",
                    self.error_description.unwrap_or_default()
                ),
            )),
            None => Err(AuthError::identity_provider(
                PROVIDER,
                "token endpoint returned neither a token nor an error",
            )),
        }
    }
}

/// GitHub device-flow client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http_client: reqwest::Client,
    config: GitHubConfig,
}

impl GitHubClient {
    /// Creates a client; every request is bounded by `config.request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(config: GitHubConfig) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AuthError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base_url.trim_end_matches('/'))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> AuthResult<T> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, request = what, "GitHub request failed");
            AuthError::identity_provider(PROVIDER, format!("{what} request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), request = what, "GitHub returned an error status");
            return Err(AuthError::identity_provider(
                PROVIDER,
                format!("{what} returned HTTP {}", status.as_u16()),
            ));
        }

        response.json::<T>().await.map_err(|e| {
            tracing::warn!(error = %e, request = what, "Failed to parse GitHub response");
            AuthError::identity_provider(PROVIDER, format!("invalid {what} response: {e}"))
        })
    }
}

#[async_trait]
impl IdentityProviderClient for GitHubClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn request_device_code(&self) -> AuthResult<DeviceCode> {
        let request = self
            .http_client
            .post(&self.config.device_code_url)
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("scope", self.config.scope.as_str()),
            ]);

        self.send_json(request, "device code").await
    }

    async fn poll_for_token(&self, device_code: &str) -> AuthResult<PollOutcome> {
        let request = self
            .http_client
            .post(&self.config.access_token_url)
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("device_code", device_code),
                ("grant_type", DEVICE_GRANT_TYPE),
            ]);

        let response: AccessTokenResponse = self.send_json(request, "access token").await?;
        response.into_outcome()
    }

    async fn get_profile(&self, access_token: &str) -> AuthResult<ProviderProfile> {
        let request = self
            .http_client
            .get(self.api_url("/user"))
            .header(ACCEPT, GITHUB_JSON)
            .bearer_auth(access_token);

        self.send_json(request, "user").await
    }

    async fn get_emails(&self, access_token: &str) -> AuthResult<Vec<ProviderEmail>> {
        let request = self
            .http_client
            .get(self.api_url("/user/emails"))
            .header(ACCEPT, GITHUB_JSON)
            .bearer_auth(access_token);

        self.send_json(request, "user emails").await
    }
}
