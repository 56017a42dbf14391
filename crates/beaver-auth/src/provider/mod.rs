//! Identity provider collaborator.
//!
//! The device flow talks to the provider through [`IdentityProviderClient`].
//! Raw provider responses are decoded once, at this boundary, into
//! [`PollOutcome`] so the coordinator never inspects error strings.

pub mod github;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::AuthResult;

pub use github::GitHubClient;

/// Device authorization issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceCode {
    /// Secret code used to poll; never shown to the user.
    pub device_code: String,
    /// Code the user types at the verification URL.
    pub user_code: String,
    /// Where the user approves the request.
    pub verification_uri: String,
    /// Seconds until the device code expires.
    pub expires_in: u64,
    /// Minimum seconds between polls.
    pub interval: u64,
}

/// Result of polling the provider for an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The user approved; carries the provider access token.
    Granted(String),
    /// The user has not acted yet.
    Pending,
    /// The client polled too quickly; still pending.
    SlowDown,
    /// The device code expired at the provider.
    Expired,
    /// The user declined the request.
    Denied,
}

/// Provider account profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// One email address attached to a provider account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEmail {
    pub email: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
}

/// Picks the primary email, falling back to the first one listed.
#[must_use]
pub fn select_email(emails: &[ProviderEmail]) -> Option<&str> {
    emails
        .iter()
        .find(|e| e.primary)
        .or_else(|| emails.first())
        .map(|e| e.email.as_str())
}

/// HTTP collaborator exposing the device authorization grant.
///
/// Every call is individually bounded by a timeout. A non-success response is
/// a hard failure reported as `AuthError::IdentityProvider`.
#[async_trait]
pub trait IdentityProviderClient: Send + Sync {
    /// Short provider name used in errors and logs.
    fn name(&self) -> &str;

    /// Starts a device authorization.
    async fn request_device_code(&self) -> AuthResult<DeviceCode>;

    /// Polls for the access token of a started authorization.
    async fn poll_for_token(&self, device_code: &str) -> AuthResult<PollOutcome>;

    /// Fetches the profile of the token's owner.
    async fn get_profile(&self, access_token: &str) -> AuthResult<ProviderProfile>;

    /// Fetches the email addresses of the token's owner.
    async fn get_emails(&self, access_token: &str) -> AuthResult<Vec<ProviderEmail>>;
}
