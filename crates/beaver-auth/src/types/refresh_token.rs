//! Persisted refresh and service token records.
//!
//! # Security
//!
//! - Only the SHA-256 hash of a token is ever stored
//! - At most one record exists per hash
//! - A record is deleted when its token is rotated, revoked, or found expired

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::token::TokenClaims;

/// What a stored token record backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// An interactive session's refresh token.
    Refresh,
    /// A named, long-lived service access token.
    Service,
}

impl TokenKind {
    /// Returns the storage representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::Service => "service",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "refresh" => Ok(Self::Refresh),
            "service" => Ok(Self::Service),
            other => Err(format!("unknown token kind '{other}'")),
        }
    }
}

/// A live refresh or service token, stored by hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Record identifier.
    pub id: Uuid,

    /// Owner of the token.
    pub user_id: Uuid,

    /// SHA-256 hash (hex) of the raw token.
    pub token_hash: String,

    /// Refresh or service token.
    pub kind: TokenKind,

    /// Human-readable label; set for service tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// When the token was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// When the token stops being accepted.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl RefreshTokenRecord {
    /// Builds the record for a freshly signed token.
    ///
    /// Timestamps are taken from the token's own claims so that the stored
    /// expiry matches the embedded one.
    #[must_use]
    pub fn for_token(
        user_id: Uuid,
        raw_token: &str,
        claims: &TokenClaims,
        kind: TokenKind,
        name: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hash_token(raw_token),
            kind,
            name,
            issued_at: claims.issued_at(),
            expires_at: claims.expires_at(),
        }
    }

    /// Returns `true` if the stored expiry has passed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }

    /// Returns `true` if the stored expiry has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }
}

/// Hashes a raw token for storage and lookup.
#[must_use]
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
