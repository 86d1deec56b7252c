//! Connector credential encryption.
//!
//! A connector may store its password as `encrypted_password`: base64 of
//! `nonce || ciphertext || tag` under AES-256-GCM. [`CredentialCipher`] seals
//! and opens those values with the process master key; the pool factory only
//! sees the [`Decryptor`] side.
//!
//! # Example
//!
//! ```rust
//! use dataport::crypto::{generate_master_key, CredentialCipher, Decryptor};
//!
//! let cipher = CredentialCipher::new(&generate_master_key().unwrap()).unwrap();
//! let stored = cipher.encrypt("s3cret").unwrap();
//! assert_eq!(cipher.decrypt(&stored).unwrap(), "s3cret");
//! ```

pub mod master_key;

pub use master_key::{MasterKey, MASTER_KEY_ENV};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

/// AES-256 key length in bytes.
pub const KEY_LENGTH: usize = 32;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("key generation failed")]
    KeyGenerationFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    /// Wrong key or tampered data.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("invalid key length: expected {KEY_LENGTH} bytes")]
    InvalidKeyLength,

    /// Malformed base64 or shorter than a nonce.
    #[error("invalid ciphertext")]
    InvalidCiphertext,

    #[error("decrypted value is not valid UTF-8")]
    InvalidPlaintext,
}

/// Turns a stored ciphertext into plaintext.
pub trait Decryptor: Send + Sync {
    fn decrypt(&self, ciphertext: &str) -> CryptoResult<String>;
}

/// AES-256-GCM cipher for stored connector credentials.
pub struct CredentialCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl CredentialCipher {
    pub fn new(key: &[u8; KEY_LENGTH]) -> CryptoResult<Self> {
        let unbound = UnboundKey::new(&AES_256_GCM, key).map_err(|_| CryptoError::InvalidKeyLength)?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    pub fn from_master_key(master: &MasterKey) -> CryptoResult<Self> {
        Self::new(master.key())
    }

    /// Seal `plaintext` under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut sealed = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut sealed)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut stored = Vec::with_capacity(NONCE_LEN + sealed.len());
        stored.extend_from_slice(&nonce);
        stored.append(&mut sealed);
        Ok(BASE64.encode(stored))
    }

    fn open(&self, stored: &str) -> CryptoResult<Vec<u8>> {
        let mut data = BASE64
            .decode(stored.trim())
            .map_err(|_| CryptoError::InvalidCiphertext)?;
        if data.len() <= NONCE_LEN {
            return Err(CryptoError::InvalidCiphertext);
        }

        let mut sealed = data.split_off(NONCE_LEN);
        let nonce: [u8; NONCE_LEN] = data
            .try_into()
            .map_err(|_| CryptoError::InvalidCiphertext)?;

        let plaintext = self
            .key
            .open_in_place(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut sealed)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        Ok(plaintext.to_vec())
    }
}

impl Decryptor for CredentialCipher {
    fn decrypt(&self, ciphertext: &str) -> CryptoResult<String> {
        String::from_utf8(self.open(ciphertext)?).map_err(|_| CryptoError::InvalidPlaintext)
    }
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}

/// Random 32-byte master key.
pub fn generate_master_key() -> CryptoResult<[u8; KEY_LENGTH]> {
    let mut key = [0u8; KEY_LENGTH];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| CryptoError::KeyGenerationFailed)?;
    Ok(key)
}

/// Base64 form of a master key, as `DATAPORT_MASTER_KEY` expects it.
pub fn encode_key(key: &[u8; KEY_LENGTH]) -> String {
    BASE64.encode(key)
}

pub fn decode_key(encoded: &str) -> CryptoResult<[u8; KEY_LENGTH]> {
    BASE64
        .decode(encoded.trim())
        .map_err(|_| CryptoError::InvalidKeyLength)?
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength)
}
