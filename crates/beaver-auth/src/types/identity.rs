//! User identity resolved from the identity provider.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user account, keyed by the provider login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque user identifier; the `sub` of every token issued to this user.
    pub id: Uuid,

    /// Provider login.
    pub username: String,

    /// Email chosen at sign-in.
    pub email: String,
}

/// Profile data used to create or refresh an [`Identity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIdentity {
    /// Provider login; the upsert key.
    pub username: String,

    /// Email to record for the account.
    pub email: String,
}

impl NewIdentity {
    /// Creates a new identity payload.
    #[must_use]
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
        }
    }

    /// Materializes the identity with a freshly generated id.
    #[must_use]
    pub fn into_identity(self) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            username: self.username,
            email: self.email,
        }
    }
}
