//! Stateless device authorization flow.
//!
//! The handshake state lives entirely in the sealed continuation token handed
//! to the client, so any server instance can answer any poll:
//!
//! ```text
//! Start ──► continuation{device_code, expires_at}
//! Poll(continuation) ──► pending | expired | done + session
//! ```
//!
//! On a provider grant the profile and emails are fetched concurrently, the
//! user is upserted, and a session is minted and persisted in one storage
//! transaction.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::provider::{IdentityProviderClient, PollOutcome, select_email};
use crate::session::SessionIssuer;
use crate::storage::{ContinuationClaim, IdentityStore, SignIn};
use crate::token::TokenCodec;
use crate::types::{Identity, NewIdentity, Session, hash_token};
use crate::{AuthError, AuthResult};

/// Protocol state sealed into the continuation token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DeviceContinuation {
    device_code: String,
    /// Unix timestamp after which the handshake is over.
    expires_at: i64,
}

/// What the client needs to show the user and to start polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAuthorization {
    /// Verification URL the user opens.
    pub url: String,
    /// Code the user enters there.
    pub user_code: String,
    /// Seconds until the handshake expires.
    pub expires_in: u64,
    /// Minimum seconds between polls.
    pub interval: u64,
    /// Sealed continuation token to pass to every poll.
    pub token: String,
}

/// Handshake state reported to a polling client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Pending,
    Done,
    Expired,
}

/// Outcome of a poll; `session` is present only when `status` is `Done`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResult {
    pub status: PollStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

impl PollResult {
    fn pending() -> Self {
        Self {
            status: PollStatus::Pending,
            session: None,
        }
    }

    fn expired() -> Self {
        Self {
            status: PollStatus::Expired,
            session: None,
        }
    }

    fn done(session: Session) -> Self {
        Self {
            status: PollStatus::Done,
            session: Some(session),
        }
    }
}

/// Orchestrates the device authorization handshake.
pub struct DeviceFlowCoordinator {
    provider: Arc<dyn IdentityProviderClient>,
    codec: Arc<TokenCodec>,
    identities: Arc<dyn IdentityStore>,
    issuer: Arc<SessionIssuer>,
    single_use_continuation: bool,
}

impl DeviceFlowCoordinator {
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProviderClient>,
        codec: Arc<TokenCodec>,
        identities: Arc<dyn IdentityStore>,
        issuer: Arc<SessionIssuer>,
    ) -> Self {
        Self {
            provider,
            codec,
            identities,
            issuer,
            single_use_continuation: false,
        }
    }

    /// When enabled, a continuation yields at most one session; later polls
    /// report `Expired`.
    #[must_use]
    pub fn with_single_use_continuation(mut self, enabled: bool) -> Self {
        self.single_use_continuation = enabled;
        self
    }

    /// Starts a handshake with the provider.
    ///
    /// # Errors
    ///
    /// Returns `IdentityProvider` if the provider cannot issue a device code.
    pub async fn start(&self) -> AuthResult<DeviceAuthorization> {
        let code = self.provider.request_device_code().await?;

        let expires_in = i64::try_from(code.expires_in).unwrap_or(i64::MAX);
        let continuation = DeviceContinuation {
            device_code: code.device_code,
            expires_at: OffsetDateTime::now_utc()
                .unix_timestamp()
                .saturating_add(expires_in),
        };
        let token = self.codec.seal_json(&continuation)?;

        tracing::debug!(
            provider = self.provider.name(),
            expires_in = code.expires_in,
            "Device authorization started"
        );

        Ok(DeviceAuthorization {
            url: code.verification_uri,
            user_code: code.user_code,
            expires_in: code.expires_in,
            interval: code.interval,
            token,
        })
    }

    /// Advances the handshake identified by `continuation_token`.
    ///
    /// # Errors
    ///
    /// - `InvalidContinuation` if the token does not open
    /// - `IdentityProvider` if the provider fails
    /// - `Storage` if the user or session cannot be persisted
    pub async fn poll(&self, continuation_token: &str) -> AuthResult<PollResult> {
        let continuation: DeviceContinuation =
            self.codec.open_json(continuation_token).map_err(|e| {
                tracing::debug!(error = %e, "Rejected continuation token");
                AuthError::invalid_continuation("continuation token is invalid")
            })?;

        if OffsetDateTime::now_utc().unix_timestamp() > continuation.expires_at {
            return Ok(PollResult::expired());
        }

        let provider_token = match self
            .provider
            .poll_for_token(&continuation.device_code)
            .await?
        {
            PollOutcome::Granted(token) => token,
            PollOutcome::Pending | PollOutcome::SlowDown => return Ok(PollResult::pending()),
            PollOutcome::Expired | PollOutcome::Denied => return Ok(PollResult::expired()),
        };

        let (profile, emails) = tokio::try_join!(
            self.provider.get_profile(&provider_token),
            self.provider.get_emails(&provider_token),
        )?;

        let email = select_email(&emails).ok_or_else(|| {
            AuthError::identity_provider(self.provider.name(), "account has no email address")
        })?;

        let continuation_hash = hash_token(continuation_token);
        let claim = if self.single_use_continuation {
            let expires_at = OffsetDateTime::from_unix_timestamp(continuation.expires_at)
                .map_err(|e| AuthError::internal(format!("invalid continuation expiry: {e}")))?;
            Some(ContinuationClaim {
                continuation_hash: &continuation_hash,
                expires_at,
            })
        } else {
            None
        };

        let new_identity = NewIdentity::new(profile.login, email);
        let mint = |identity: &Identity| self.issuer.mint(identity);
        let (user, token_pair) = match self
            .identities
            .upsert_with_session(&new_identity, claim, &mint)
            .await?
        {
            SignIn::Completed { user, token_pair } => (user, token_pair),
            SignIn::AlreadyConsumed => {
                tracing::debug!("Continuation already consumed");
                return Ok(PollResult::expired());
            }
        };

        tracing::info!(user_id = %user.id, username = %user.username, "Device flow completed");

        Ok(PollResult::done(Session { user, token_pair }))
    }
}
