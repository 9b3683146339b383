use aes_gcm::{
    aead::{consts::U12, Aead, KeyInit, OsRng},
    aes::Aes192,
    Aes128Gcm, Aes256Gcm, AesGcm, Nonce,
};
use aes_gcm::aead::rand_core::RngCore;

use crate::crypto::codec::CodecError;

/// The size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// An AES-GCM cipher whose strength is picked from the block key length.
#[derive(Clone)]
pub enum BlockCipher {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl BlockCipher {
    /// Creates a cipher from a 16, 24 or 32-byte key.
    ///
    /// # Arguments
    ///
    /// * `key` - The block key.
    ///
    /// # Returns
    ///
    /// A `Result` containing the cipher, or `CodecError::InvalidKey` for any
    /// other key length.
    pub fn from_key(key: &[u8]) -> Result<Self, CodecError> {
        let invalid = |_| CodecError::InvalidKey(format!("block key of {} bytes", key.len()));
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key).map(Self::Aes128).map_err(invalid),
            24 => Aes192Gcm::new_from_slice(key).map(Self::Aes192).map_err(invalid),
            32 => Aes256Gcm::new_from_slice(key).map(Self::Aes256).map_err(invalid),
            n => Err(CodecError::InvalidKey(format!(
                "block key must be 16, 24 or 32 bytes, got {}",
                n
            ))),
        }
    }

    /// Encrypts `plaintext` under a fresh random nonce.
    ///
    /// # Returns
    ///
    /// `ciphertext || nonce`, where the nonce is the trailing 12 bytes.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CodecError> {
        let nonce_bytes = generate_nonce();
        let nonce = Nonce::<U12>::from_slice(&nonce_bytes);

        let mut sealed = match self {
            Self::Aes128(cipher) => cipher.encrypt(nonce, plaintext),
            Self::Aes192(cipher) => cipher.encrypt(nonce, plaintext),
            Self::Aes256(cipher) => cipher.encrypt(nonce, plaintext),
        }
        .map_err(|_| CodecError::EncryptionFailed)?;

        sealed.extend_from_slice(&nonce_bytes);
        Ok(sealed)
    }

    /// Decrypts a `ciphertext || nonce` blob produced by [`BlockCipher::encrypt`].
    pub fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, CodecError> {
        if sealed.len() < NONCE_SIZE {
            return Err(CodecError::DecryptionFailed);
        }
        let (ciphertext, nonce_bytes) = sealed.split_at(sealed.len() - NONCE_SIZE);
        let nonce = Nonce::<U12>::from_slice(nonce_bytes);

        match self {
            Self::Aes128(cipher) => cipher.decrypt(nonce, ciphertext),
            Self::Aes192(cipher) => cipher.decrypt(nonce, ciphertext),
            Self::Aes256(cipher) => cipher.decrypt(nonce, ciphertext),
        }
        .map_err(|_| CodecError::DecryptionFailed)
    }
}

/// Generates a new random AES-GCM nonce.
fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}
