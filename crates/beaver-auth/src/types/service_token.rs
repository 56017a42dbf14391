//! Service access token views.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::refresh_token::RefreshTokenRecord;

/// A service access token as listed to its owner. Never carries the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccessToken {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl From<RefreshTokenRecord> for ServiceAccessToken {
    fn from(record: RefreshTokenRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.unwrap_or_default(),
            issued_at: record.issued_at,
            expires_at: record.expires_at,
        }
    }
}

/// A newly created service access token.
///
/// `token` is the only time the raw value is ever surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedServiceToken {
    pub id: Uuid,
    pub name: String,
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}
