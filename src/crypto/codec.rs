use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::crypto::securecookie::SecureCookie;

/// Errors raised while encoding or decoding a cookie token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A key was rejected at construction.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The key ring holds no codec.
    #[error("no codecs configured")]
    NoCodecs,

    /// The token exceeds the configured maximum length.
    #[error("value too long: {len} > {max}")]
    TooLarge { len: usize, max: usize },

    /// The token is not in the expected layout.
    #[error("malformed token")]
    Malformed,

    /// The authentication code does not match.
    #[error("invalid signature")]
    InvalidSignature,

    /// The token is older than the configured max-age.
    #[error("token expired")]
    Expired,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    /// The value could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The authenticated payload could not be deserialized.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

/// Authenticated transformation between bytes and a cookie-safe token,
/// bound to a purpose (the session name).
///
/// Configuration capabilities are declared explicitly so a key ring can
/// propagate settings without knowing the concrete codec.
pub trait Codec: Send + Sync {
    fn encode(&self, purpose: &str, plain: &[u8]) -> Result<String, CodecError>;

    fn decode(&self, purpose: &str, token: &str) -> Result<Vec<u8>, CodecError>;

    /// Whether this codec enforces a token max-age.
    fn supports_max_age(&self) -> bool {
        false
    }

    /// Sets the token max-age in seconds; 0 disables the check.
    fn set_max_age(&mut self, _seconds: i64) {}

    /// Whether this codec enforces a token max-length.
    fn supports_max_length(&self) -> bool {
        false
    }

    /// Sets the token max-length in bytes; 0 disables the check.
    fn set_max_length(&mut self, _length: usize) {}
}

/// One authentication key with an optional encryption key.
///
/// Recommended sizes: 32 or 64 bytes for `hash_key`; 16, 24 or 32 bytes
/// for `block_key`.
#[derive(Clone)]
pub struct KeyPair {
    pub hash_key: Zeroizing<Vec<u8>>,
    pub block_key: Option<Zeroizing<Vec<u8>>>,
}

impl KeyPair {
    /// Creates an authentication-only key pair.
    pub fn new(hash_key: impl Into<Vec<u8>>) -> Self {
        Self {
            hash_key: Zeroizing::new(hash_key.into()),
            block_key: None,
        }
    }

    /// Adds an encryption key.
    pub fn with_block_key(mut self, block_key: impl Into<Vec<u8>>) -> Self {
        self.block_key = Some(Zeroizing::new(block_key.into()));
        self
    }
}

/// Ordered set of codecs, newest first.
///
/// Encoding always uses the newest codec; decoding tries each in order and
/// the first one that authenticates the token wins, so old keys can be kept
/// around while cookies issued under them age out.
pub struct KeyRing {
    codecs: Vec<Box<dyn Codec>>,
}

impl KeyRing {
    /// Builds a key ring from existing codecs.
    pub fn new(codecs: Vec<Box<dyn Codec>>) -> Self {
        Self { codecs }
    }

    /// Builds one [`SecureCookie`] per key pair, preserving order.
    pub fn from_pairs(pairs: &[KeyPair]) -> Result<Self, CodecError> {
        if pairs.is_empty() {
            return Err(CodecError::NoCodecs);
        }
        let codecs = pairs
            .iter()
            .map(|pair| {
                SecureCookie::new(&pair.hash_key, pair.block_key.as_deref().map(|k| k.as_slice()))
                    .map(|codec| Box::new(codec) as Box<dyn Codec>)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { codecs })
    }

    /// Serializes `value` and encodes it with the newest codec.
    pub fn encode<T: Serialize + ?Sized>(&self, purpose: &str, value: &T) -> Result<String, CodecError> {
        let codec = self.codecs.first().ok_or(CodecError::NoCodecs)?;
        let plain = sonic_rs::to_vec(value).map_err(|e| CodecError::Serialization(e.to_string()))?;
        codec.encode(purpose, &plain)
    }

    /// Decodes `token` with the first codec that accepts it.
    ///
    /// When every codec rejects the token, the error of the newest one is
    /// returned.
    pub fn decode<T: DeserializeOwned>(&self, purpose: &str, token: &str) -> Result<T, CodecError> {
        let mut first_error = None;
        for codec in &self.codecs {
            match codec.decode(purpose, token) {
                Ok(plain) => {
                    return sonic_rs::from_slice(&plain)
                        .map_err(|e| CodecError::Deserialization(e.to_string()));
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        Err(first_error.unwrap_or(CodecError::NoCodecs))
    }

    /// Propagates a max-age to every codec that supports one.
    pub fn set_max_age(&mut self, seconds: i64) {
        for codec in self.codecs.iter_mut().filter(|c| c.supports_max_age()) {
            codec.set_max_age(seconds);
        }
    }

    /// Propagates a max-length to every codec that supports one.
    pub fn set_max_length(&mut self, length: usize) {
        for codec in self.codecs.iter_mut().filter(|c| c.supports_max_length()) {
            codec.set_max_length(length);
        }
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}
