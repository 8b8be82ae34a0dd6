//! Error taxonomy of the field encryption layer.

use thiserror::Error;

use crate::envelope::EnvelopeError;

/// Failure of a field encryption operation.
///
/// Messages never include plaintext, ciphertext, or key material.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FieldCryptoError {
    /// The crypto provider is unavailable or key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// AEAD encryption or IV generation failed.
    #[error("encryption failed: {0}")]
    Encrypt(String),

    /// The envelope could not be decoded, authentication failed, or the
    /// plaintext is not UTF-8.
    #[error("decryption failed: {0}")]
    Decrypt(String),
}

impl FieldCryptoError {
    /// Stable label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldCryptoError::KeyDerivation(_) => "key_derivation",
            FieldCryptoError::Encrypt(_) => "encrypt",
            FieldCryptoError::Decrypt(_) => "decrypt",
        }
    }
}

impl From<EnvelopeError> for FieldCryptoError {
    fn from(e: EnvelopeError) -> Self {
        FieldCryptoError::Decrypt(e.to_string())
    }
}
