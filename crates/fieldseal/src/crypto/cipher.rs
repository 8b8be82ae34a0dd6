//! Sealing and opening one field value under one key.
//!
//! A fresh 96-bit IV is drawn from the provider for every call. AES-GCM IV
//! reuse under the same key breaks both confidentiality and authentication,
//! so the IV is never derived from the plaintext or reused.

use common::envelope::{SealedPayload, IV_LEN};
use common::FieldCryptoError;

use super::provider::CryptoProvider;
use crate::key::EncryptionKey;

/// Encrypt `plaintext` under `key` with a fresh random IV.
///
/// # Errors
///
/// Returns [`FieldCryptoError::Encrypt`] if IV generation or the AEAD seal fails.
pub fn encrypt_field(
    provider: &dyn CryptoProvider,
    key: &EncryptionKey,
    plaintext: &[u8],
) -> Result<SealedPayload, FieldCryptoError> {
    let mut iv = [0u8; IV_LEN];
    provider
        .fill_random(&mut iv)
        .map_err(|e| FieldCryptoError::Encrypt(e.to_string()))?;

    let ciphertext = provider
        .seal(key.as_bytes(), &iv, plaintext)
        .map_err(|e| FieldCryptoError::Encrypt(e.to_string()))?;

    Ok(SealedPayload { iv, ciphertext })
}

/// Decrypt and authenticate `payload` under `key`.
///
/// # Errors
///
/// Returns [`FieldCryptoError::Decrypt`] if authentication fails (wrong key or
/// tampered data).
pub fn decrypt_field(
    provider: &dyn CryptoProvider,
    key: &EncryptionKey,
    payload: &SealedPayload,
) -> Result<Vec<u8>, FieldCryptoError> {
    provider
        .open(key.as_bytes(), &payload.iv, &payload.ciphertext)
        .map_err(|e| FieldCryptoError::Decrypt(e.to_string()))
}
