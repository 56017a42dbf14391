//! Domain types for identities, sessions and stored tokens.

pub mod identity;
pub mod refresh_token;
pub mod service_token;
pub mod session;

pub use identity::{Identity, NewIdentity};
pub use refresh_token::{RefreshTokenRecord, TokenKind, hash_token};
pub use service_token::{CreatedServiceToken, ServiceAccessToken};
pub use session::{MintedSession, Session, TokenPair};
