//! Token signing, verification and continuation sealing.

pub mod codec;

pub use codec::{CodecError, SECRET_LEN, SignedToken, TokenClaims, TokenCodec, TokenType};
