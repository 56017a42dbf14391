//! Storage traits for identities and refresh tokens.
//!
//! # Implementations
//!
//! - `beaver-auth-postgres` - PostgreSQL storage backend
//! - [`MemoryAuthStorage`] - in-process maps, for tests and local runs

pub mod identity;
pub mod memory;
pub mod refresh_token;

pub use identity::{ContinuationClaim, IdentityStore, SessionMinter, SignIn};
pub use memory::MemoryAuthStorage;
pub use refresh_token::RefreshTokenStore;
