use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::crypto::aes::BlockCipher;
use crate::crypto::codec::{Codec, CodecError};

type HmacSha256 = Hmac<Sha256>;

/// Default token max-age in seconds (30 days).
pub const DEFAULT_MAX_AGE: i64 = 60 * 60 * 24 * 30;
/// Default token max-length in bytes.
pub const DEFAULT_MAX_LENGTH: usize = 4096;

/// HMAC-SHA256 authenticated, optionally AES-GCM encrypted cookie codec.
///
/// Token layout, base64url without padding:
///
/// ```text
/// timestamp "|" base64url(payload) "|" HMAC(purpose "|" timestamp "|" base64url(payload))
/// ```
///
/// The purpose never travels with the token, so a token minted for one
/// session name fails authentication under any other.
pub struct SecureCookie {
    hash_key: Zeroizing<Vec<u8>>,
    block: Option<BlockCipher>,
    max_age: i64,
    max_length: usize,
}

impl SecureCookie {
    /// Creates a codec from a hash key and an optional block key.
    ///
    /// # Arguments
    ///
    /// * `hash_key` - The authentication key; must not be empty.
    /// * `block_key` - The encryption key (16, 24 or 32 bytes), if any.
    pub fn new(hash_key: &[u8], block_key: Option<&[u8]>) -> Result<Self, CodecError> {
        if hash_key.is_empty() {
            return Err(CodecError::InvalidKey("hash key must not be empty".to_string()));
        }
        let block = block_key.map(BlockCipher::from_key).transpose()?;

        Ok(Self {
            hash_key: Zeroizing::new(hash_key.to_vec()),
            block,
            max_age: DEFAULT_MAX_AGE,
            max_length: DEFAULT_MAX_LENGTH,
        })
    }

    fn mac(&self, purpose: &str, timestamp: &[u8], payload: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut mac = HmacSha256::new_from_slice(&self.hash_key)
            .map_err(|e| CodecError::InvalidKey(e.to_string()))?;
        mac.update(purpose.as_bytes());
        mac.update(b"|");
        mac.update(timestamp);
        mac.update(b"|");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn check_length(&self, len: usize) -> Result<(), CodecError> {
        if self.max_length != 0 && len > self.max_length {
            return Err(CodecError::TooLarge {
                len,
                max: self.max_length,
            });
        }
        Ok(())
    }
}

impl Codec for SecureCookie {
    fn encode(&self, purpose: &str, plain: &[u8]) -> Result<String, CodecError> {
        let payload = match &self.block {
            Some(cipher) => cipher.encrypt(plain)?,
            None => plain.to_vec(),
        };
        let payload = URL_SAFE_NO_PAD.encode(payload);
        let timestamp = Utc::now().timestamp().to_string();
        let mac = self.mac(purpose, timestamp.as_bytes(), payload.as_bytes())?;

        let mut raw = Vec::with_capacity(timestamp.len() + payload.len() + mac.len() + 2);
        raw.extend_from_slice(timestamp.as_bytes());
        raw.push(b'|');
        raw.extend_from_slice(payload.as_bytes());
        raw.push(b'|');
        raw.extend_from_slice(&mac);

        let token = URL_SAFE_NO_PAD.encode(raw);
        self.check_length(token.len())?;
        Ok(token)
    }

    fn decode(&self, purpose: &str, token: &str) -> Result<Vec<u8>, CodecError> {
        self.check_length(token.len())?;

        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| CodecError::Malformed)?;
        let mut parts = raw.splitn(3, |b| *b == b'|');
        let (Some(timestamp), Some(payload), Some(mac)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CodecError::Malformed);
        };

        let expected = self.mac(purpose, timestamp, payload)?;
        if !bool::from(expected.ct_eq(mac)) {
            return Err(CodecError::InvalidSignature);
        }

        let issued_at: i64 = std::str::from_utf8(timestamp)
            .ok()
            .and_then(|t| t.parse().ok())
            .ok_or(CodecError::Malformed)?;
        if self.max_age != 0 && issued_at < Utc::now().timestamp().saturating_sub(self.max_age) {
            return Err(CodecError::Expired);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| CodecError::Malformed)?;
        match &self.block {
            Some(cipher) => cipher.decrypt(&payload),
            None => Ok(payload),
        }
    }

    fn supports_max_age(&self) -> bool {
        true
    }

    fn set_max_age(&mut self, seconds: i64) {
        self.max_age = seconds;
    }

    fn supports_max_length(&self) -> bool {
        true
    }

    fn set_max_length(&mut self, length: usize) {
        self.max_length = length;
    }
}
