//! Issued session types.

use serde::{Deserialize, Serialize};

use super::identity::Identity;
use super::refresh_token::RefreshTokenRecord;

/// An access/refresh token pair handed to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived bearer token.
    pub access_token: String,

    /// Long-lived token exchanged through rotation.
    pub refresh_token: String,
}

/// A completed sign-in: the user and their tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: Identity,
    pub token_pair: TokenPair,
}

/// A signed token pair together with the record that must be persisted
/// before the pair is handed out.
#[derive(Debug, Clone)]
pub struct MintedSession {
    pub pair: TokenPair,
    pub record: RefreshTokenRecord,
}
