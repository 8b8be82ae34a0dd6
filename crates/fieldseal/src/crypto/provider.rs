//! The platform crypto seam: random bytes, PBKDF2, and AES-256-GCM.

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use common::envelope::IV_LEN;
use hmac::Hmac;
use sha2::Sha256;
use thiserror::Error;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Errors produced by a [`CryptoProvider`].
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The random byte generator failed.
    #[error("random byte generation failed")]
    Random,

    /// PBKDF2 rejected its parameters.
    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// AES-GCM encryption or decryption failed (including tag mismatch).
    #[error("aead operation failed")]
    Aead,

    /// The key is not [`KEY_LEN`] bytes.
    #[error("invalid key length: expected {KEY_LEN} bytes")]
    InvalidKeyLength,
}

/// Cryptographic primitives the field layer is built on.
///
/// The default implementation is [`RustCryptoProvider`]; tests substitute a
/// mock to exercise failure paths.
#[cfg_attr(test, mockall::automock)]
pub trait CryptoProvider: Send + Sync {
    /// Fill `buf` with cryptographically secure random bytes.
    fn fill_random(&self, buf: &mut [u8]) -> Result<(), ProviderError>;

    /// Stretch `password` into a 256-bit key with PBKDF2-HMAC-SHA256.
    fn derive_key(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
    ) -> Result<[u8; KEY_LEN], ProviderError>;

    /// AES-256-GCM encrypt; the result is the ciphertext with the tag appended.
    fn seal(&self, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, ProviderError>;

    /// AES-256-GCM decrypt and authenticate `ciphertext` (tag appended).
    fn open(&self, key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, ProviderError>;
}

/// [`CryptoProvider`] backed by the RustCrypto `aes-gcm` and `pbkdf2` crates
/// and the OS CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoProvider;

impl CryptoProvider for RustCryptoProvider {
    fn fill_random(&self, buf: &mut [u8]) -> Result<(), ProviderError> {
        OsRng.try_fill_bytes(buf).map_err(|_| ProviderError::Random)
    }

    fn derive_key(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
    ) -> Result<[u8; KEY_LEN], ProviderError> {
        if iterations == 0 {
            return Err(ProviderError::Kdf("iteration count must be non-zero".into()));
        }
        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, iterations, &mut key)
            .map_err(|e| ProviderError::Kdf(e.to_string()))?;
        Ok(key)
    }

    fn seal(&self, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, ProviderError> {
        let cipher = build_cipher(key)?;
        check_iv(iv)?;
        cipher
            .encrypt(Nonce::from_slice(iv), plaintext)
            .map_err(|_| ProviderError::Aead)
    }

    fn open(&self, key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, ProviderError> {
        let cipher = build_cipher(key)?;
        check_iv(iv)?;
        cipher
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|_| ProviderError::Aead)
    }
}

fn build_cipher(key: &[u8]) -> Result<Aes256Gcm, ProviderError> {
    if key.len() != KEY_LEN {
        return Err(ProviderError::InvalidKeyLength);
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| ProviderError::InvalidKeyLength)
}

// `Nonce::from_slice` panics on a wrong length.
fn check_iv(iv: &[u8]) -> Result<(), ProviderError> {
    if iv.len() != IV_LEN {
        return Err(ProviderError::Aead);
    }
    Ok(())
}
