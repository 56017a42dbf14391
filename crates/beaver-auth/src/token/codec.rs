//! Signed token and sealed continuation codec.
//!
//! [`TokenCodec`] is a pure function of the process secret. It produces two
//! kinds of artifacts:
//!
//! - **Signed tokens**: HS256 JWTs carrying [`TokenClaims`]. The token type is
//!   bound into both the `token_type` claim and the audience, so an access
//!   token can never be replayed where a session token is expected.
//! - **Sealed blobs**: AES-256-GCM ciphertext with a random 96-bit nonce,
//!   encoded as `base64url(nonce || ciphertext)`. Any modification makes
//!   [`TokenCodec::open`] fail.
//!
//! Signing and encryption use separate subkeys derived from the secret.
//!
//! [`TokenCodec::verify`] checks signature, issuer and type binding but
//! leaves expiry to the caller, which compares
//! [`TokenClaims::exp`] against its own clock.

use std::fmt;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Required length of the process secret in bytes.
pub const SECRET_LEN: usize = 32;

/// Nonce size for AES-256-GCM (96 bits).
const NONCE_SIZE: usize = 12;

/// GCM authentication tag size.
const TAG_SIZE: usize = 16;

const SIGNING_KEY_LABEL: &[u8] = b"beaver/token-signing";
const SEALING_KEY_LABEL: &[u8] = b"beaver/continuation-sealing";
const SEAL_AAD: &[u8] = b"beaver-continuation-v1";

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while signing, verifying, sealing or opening.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The token signature does not match.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token cannot be parsed or its claims are inconsistent.
    #[error("Malformed token: {message}")]
    Malformed {
        /// Description of what is wrong with the token.
        message: String,
    },

    /// A sealed blob failed to decode or authenticate.
    #[error("Sealed payload is invalid or has been tampered with")]
    InvalidOrTampered,

    /// Failed to produce a token or sealed blob.
    #[error("Encoding error: {message}")]
    Encoding {
        /// Description of the encoding error.
        message: String,
    },

    /// The secret is unusable.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl CodecError {
    /// Creates a new `Malformed` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates a new `Encoding` error.
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for CodecError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::malformed(err.to_string()),
        }
    }
}

// ============================================================================
// Token Type
// ============================================================================

/// The family a signed token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived, self-contained bearer token.
    Access,
    /// Long-lived token exchanged for a new pair; backed by a stored record.
    Refresh,
    /// Long-lived token for non-interactive clients; backed by a stored record.
    Session,
}

impl TokenType {
    /// Returns the claim value for this type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::Session => "session",
        }
    }

    /// Returns the audience bound to this token type.
    #[must_use]
    pub fn audience(&self) -> &'static str {
        match self {
            Self::Access => "beaver:api",
            Self::Refresh => "beaver:refresh",
            Self::Session => "beaver:service",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Token Claims
// ============================================================================

/// Claims carried by every signed token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// Random nonce identifying this token.
    pub jti: String,

    /// Subject (user id).
    pub sub: String,

    /// Issuer.
    pub iss: String,

    /// Audience derived from the token type.
    pub aud: String,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Not before (Unix timestamp).
    pub nbf: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Token family.
    pub token_type: TokenType,
}

impl TokenClaims {
    /// Parses the subject as a user id.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` if the subject is not a UUID.
    pub fn subject_id(&self) -> Result<Uuid, CodecError> {
        Uuid::parse_str(&self.sub).map_err(|_| CodecError::malformed("subject is not a user id"))
    }

    /// Returns `true` if the token is no longer valid at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.exp <= now.unix_timestamp()
    }

    /// Returns the issue instant.
    #[must_use]
    pub fn issued_at(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.iat).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    /// Returns the expiry instant.
    #[must_use]
    pub fn expires_at(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.exp).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }
}

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct SignedToken {
    /// The compact JWT.
    pub token: String,
    /// The claims encoded in `token`.
    pub claims: TokenClaims,
}

// ============================================================================
// Token Codec
// ============================================================================

/// Signs and verifies tokens, seals and opens continuation blobs.
///
/// This type is `Send + Sync` and is shared behind an `Arc`.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    cipher: Aes256Gcm,
    issuer: String,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Creates a codec from the process secret.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` unless `secret` is exactly [`SECRET_LEN`] bytes.
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Result<Self, CodecError> {
        if secret.len() != SECRET_LEN {
            return Err(CodecError::invalid_key(format!(
                "secret must be {SECRET_LEN} bytes, got {}",
                secret.len()
            )));
        }

        let signing_key = derive_key(secret, SIGNING_KEY_LABEL);
        let sealing_key = derive_key(secret, SEALING_KEY_LABEL);

        let cipher = Aes256Gcm::new_from_slice(&sealing_key)
            .map_err(|e| CodecError::invalid_key(format!("Failed to create cipher: {e}")))?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&signing_key),
            decoding_key: DecodingKey::from_secret(&signing_key),
            cipher,
            issuer: issuer.into(),
        })
    }

    /// Returns the issuer claim value.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Signs a token of `token_type` for `subject`, valid for `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns `Encoding` if the JWT cannot be produced.
    pub fn sign(
        &self,
        token_type: TokenType,
        subject: Uuid,
        ttl: Duration,
    ) -> Result<String, CodecError> {
        self.issue(token_type, subject, ttl).map(|signed| signed.token)
    }

    /// Like [`sign`](Self::sign), but also returns the encoded claims.
    ///
    /// # Errors
    ///
    /// Returns `Encoding` if the JWT cannot be produced.
    pub fn issue(
        &self,
        token_type: TokenType,
        subject: Uuid,
        ttl: Duration,
    ) -> Result<SignedToken, CodecError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = TokenClaims {
            jti: Uuid::new_v4().to_string(),
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            aud: token_type.audience().to_string(),
            iat: now,
            nbf: now,
            exp: now + ttl.whole_seconds(),
            token_type,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| CodecError::encoding(e.to_string()))?;

        Ok(SignedToken { token, claims })
    }

    /// Verifies signature, issuer and type binding. Expiry is not checked.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignature` for a bad signature and `Malformed` for
    /// anything else that prevents reading trustworthy claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, CodecError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        let claims = decode::<TokenClaims>(token, &self.decoding_key, &validation)?.claims;

        if claims.aud != claims.token_type.audience() {
            return Err(CodecError::malformed("audience does not match token type"));
        }

        Ok(claims)
    }

    /// Verifies a token and requires it to be of `expected` type.
    ///
    /// # Errors
    ///
    /// Same as [`verify`](Self::verify), plus `Malformed` on a type mismatch.
    pub fn verify_as(&self, token: &str, expected: TokenType) -> Result<TokenClaims, CodecError> {
        let claims = self.verify(token)?;
        if claims.token_type != expected {
            return Err(CodecError::malformed(format!(
                "expected {expected} token, got {}",
                claims.token_type
            )));
        }
        Ok(claims)
    }

    /// Encrypts and authenticates `payload`.
    ///
    /// # Errors
    ///
    /// Returns `Encoding` if encryption fails.
    pub fn seal(&self, payload: &[u8]) -> Result<String, CodecError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: payload,
                    aad: SEAL_AAD,
                },
            )
            .map_err(|e| CodecError::encoding(format!("Encryption failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Decrypts a blob produced by [`seal`](Self::seal).
    ///
    /// # Errors
    ///
    /// Returns `InvalidOrTampered` if the blob does not decode or authenticate.
    pub fn open(&self, sealed: &str) -> Result<Vec<u8>, CodecError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(sealed.trim())
            .map_err(|_| CodecError::InvalidOrTampered)?;

        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CodecError::InvalidOrTampered);
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: SEAL_AAD,
                },
            )
            .map_err(|_| CodecError::InvalidOrTampered)
    }

    /// Serializes `value` as JSON and seals it.
    ///
    /// # Errors
    ///
    /// Returns `Encoding` if serialization or encryption fails.
    pub fn seal_json<T: Serialize>(&self, value: &T) -> Result<String, CodecError> {
        let payload = serde_json::to_vec(value).map_err(|e| CodecError::encoding(e.to_string()))?;
        self.seal(&payload)
    }

    /// Opens a blob produced by [`seal_json`](Self::seal_json).
    ///
    /// # Errors
    ///
    /// Returns `InvalidOrTampered` if the blob fails to open or parse.
    pub fn open_json<T: DeserializeOwned>(&self, sealed: &str) -> Result<T, CodecError> {
        let payload = self.open(sealed)?;
        serde_json::from_slice(&payload).map_err(|_| CodecError::InvalidOrTampered)
    }
}

fn derive_key(secret: &[u8], label: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(label);
    hasher.update([0u8]);
    hasher.update(secret);
    hasher.finalize().into()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUER: &str = "beaver_api";

    fn codec() -> TokenCodec {
        TokenCodec::new(&[7u8; SECRET_LEN], ISSUER).unwrap()
    }

    #[test]
    fn test_rejects_short_secret() {
        let err = TokenCodec::new(&[1u8; 16], ISSUER).unwrap_err();
        assert!(matches!(err, CodecError::InvalidKey { .. }));
    }

    #[test]
    fn test_sign_and_verify() {
        let codec = codec();
        let subject = Uuid::new_v4();
        let ttl = Duration::days(7);

        let token = codec.sign(TokenType::Access, subject, ttl).unwrap();
        let claims = codec.verify(&token).unwrap();

        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.subject_id().unwrap(), subject);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.aud, "beaver:api");
        assert_eq!(claims.exp - claims.iat, ttl.whole_seconds());
        assert_eq!(claims.nbf, claims.iat);
        assert!(!claims.is_expired_at(OffsetDateTime::now_utc()));
    }

    #[test]
    fn test_each_token_gets_fresh_nonce() {
        let codec = codec();
        let subject = Uuid::new_v4();

        let a = codec.issue(TokenType::Refresh, subject, Duration::hours(1)).unwrap();
        let b = codec.issue(TokenType::Refresh, subject, Duration::hours(1)).unwrap();

        assert_ne!(a.claims.jti, b.claims.jti);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_verify_does_not_check_expiry() {
        let codec = codec();
        let token = codec
            .sign(TokenType::Access, Uuid::new_v4(), Duration::seconds(-60))
            .unwrap();

        let claims = codec.verify(&token).unwrap();
        assert!(claims.is_expired_at(OffsetDateTime::now_utc()));
    }

    #[test]
    fn test_verify_rejects_foreign_signature() {
        let other = TokenCodec::new(&[9u8; SECRET_LEN], ISSUER).unwrap();
        let token = other
            .sign(TokenType::Access, Uuid::new_v4(), Duration::hours(1))
            .unwrap();

        let err = codec().verify(&token).unwrap_err();
        assert!(matches!(err, CodecError::InvalidSignature));
    }

    #[test]
    fn test_verify_rejects_other_issuer() {
        let other = TokenCodec::new(&[7u8; SECRET_LEN], "someone_else").unwrap();
        let token = other
            .sign(TokenType::Access, Uuid::new_v4(), Duration::hours(1))
            .unwrap();

        let err = codec().verify(&token).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let err = codec().verify("not-a-token").unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }

    #[test]
    fn test_verify_as_enforces_type() {
        let codec = codec();
        let token = codec
            .sign(TokenType::Access, Uuid::new_v4(), Duration::hours(1))
            .unwrap();

        assert!(codec.verify_as(&token, TokenType::Access).is_ok());
        let err = codec.verify_as(&token, TokenType::Session).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }

    #[test]
    fn test_seal_and_open() {
        let codec = codec();
        let payload = b"device-code-123";

        let sealed = codec.seal(payload).unwrap();
        assert_eq!(codec.open(&sealed).unwrap(), payload);
    }

    #[test]
    fn test_seal_is_randomized() {
        let codec = codec();
        let a = codec.seal(b"same").unwrap();
        let b = codec.seal(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_open_detects_single_bit_flip() {
        let codec = codec();
        let sealed = codec.seal(b"device-code-123").unwrap();

        let bytes = URL_SAFE_NO_PAD.decode(&sealed).unwrap();
        assert_eq!(bytes.len(), NONCE_SIZE + b"device-code-123".len() + TAG_SIZE);

        // Nonce, ciphertext and tag are all authenticated
        for index in 0..bytes.len() {
            for bit in 0..8 {
                let mut flipped = bytes.clone();
                flipped[index] ^= 1 << bit;
                let tampered = URL_SAFE_NO_PAD.encode(&flipped);

                let result = codec.open(&tampered);
                assert!(
                    matches!(result, Err(CodecError::InvalidOrTampered)),
                    "flip of bit {bit} in byte {index} was accepted"
                );
            }
        }
    }

    #[test]
    fn test_open_rejects_other_key_and_junk() {
        let sealed = codec().seal(b"payload").unwrap();
        let other = TokenCodec::new(&[9u8; SECRET_LEN], ISSUER).unwrap();

        assert!(matches!(
            other.open(&sealed),
            Err(CodecError::InvalidOrTampered)
        ));
        assert!(matches!(
            codec().open("!!!"),
            Err(CodecError::InvalidOrTampered)
        ));
        assert!(matches!(
            codec().open("AAAA"),
            Err(CodecError::InvalidOrTampered)
        ));
    }

    #[test]
    fn test_seal_json_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct State {
            code: String,
            exp: i64,
        }

        let codec = codec();
        let state = State {
            code: "abc".to_string(),
            exp: 42,
        };

        let sealed = codec.seal_json(&state).unwrap();
        let opened: State = codec.open_json(&sealed).unwrap();
        assert_eq!(opened, state);

        let raw = codec.seal(b"not json").unwrap();
        assert!(matches!(
            codec.open_json::<State>(&raw),
            Err(CodecError::InvalidOrTampered)
        ));
    }

    #[test]
    fn test_debug_hides_keys() {
        let rendered = format!("{:?}", codec());
        assert!(rendered.contains("beaver_api"));
        assert!(!rendered.contains("encoding_key"));
    }
}
