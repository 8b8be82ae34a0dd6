//! Encrypt, decrypt, and detect single string fields.
//!
//! The `try_*` methods report failures as [`FieldCryptoError`]. The plain
//! [`FieldCipher::encrypt`] and [`FieldCipher::decrypt`] never fail: they log
//! and hand back their input unchanged, so a crypto fault can neither block a
//! write nor break a page that displays the field.

use std::sync::Arc;

use common::envelope::{Format, FormatDetector, SealedPayload};
use common::FieldCryptoError;
use tracing::warn;

use crate::crypto::{decrypt_field, encrypt_field, CryptoProvider};
use crate::key::KeyProvider;

/// Field-level encryptor bound to a crypto provider and a key provider.
///
/// Cheap to clone; clones share the key memo.
#[derive(Clone)]
pub struct FieldCipher {
    provider: Arc<dyn CryptoProvider>,
    keys: Arc<dyn KeyProvider>,
    detector: FormatDetector,
}

impl FieldCipher {
    pub fn new(
        provider: Arc<dyn CryptoProvider>,
        keys: Arc<dyn KeyProvider>,
        detector: FormatDetector,
    ) -> Self {
        Self {
            provider,
            keys,
            detector,
        }
    }

    /// The key provider, e.g. to [`KeyProvider::invalidate`] it.
    pub fn keys(&self) -> &Arc<dyn KeyProvider> {
        &self.keys
    }

    /// Returns `true` for tagged values and for untagged values that look like
    /// legacy ciphertext. Heuristic for untagged values.
    pub fn is_encrypted(&self, value: &str) -> bool {
        self.detector.is_encrypted(value)
    }

    /// Encrypt `plaintext` into the tagged `ENC1:` format.
    ///
    /// The empty string is returned as-is.
    ///
    /// # Errors
    ///
    /// [`FieldCryptoError::KeyDerivation`] if no key is available,
    /// [`FieldCryptoError::Encrypt`] if IV generation or sealing fails.
    pub async fn try_encrypt(&self, plaintext: &str) -> Result<String, FieldCryptoError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        let key = self.keys.get_or_derive_key().await?;
        let payload = encrypt_field(self.provider.as_ref(), &key, plaintext.as_bytes())?;
        Ok(payload.to_tagged_string())
    }

    /// Encrypt `plaintext`, falling back to the plaintext itself on failure.
    pub async fn encrypt(&self, plaintext: &str) -> String {
        match self.try_encrypt(plaintext).await {
            Ok(sealed) => sealed,
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "field encryption failed; value left in plaintext");
                plaintext.to_owned()
            }
        }
    }

    /// Decrypt a tagged or legacy value; plaintext is returned unchanged.
    ///
    /// The current key is tried first, then retired keys newest first.
    ///
    /// # Errors
    ///
    /// [`FieldCryptoError::Decrypt`] if the payload is malformed, no key
    /// authenticates it, or it does not decode to UTF-8;
    /// [`FieldCryptoError::KeyDerivation`] if no key is available.
    pub async fn try_decrypt(&self, value: &str) -> Result<String, FieldCryptoError> {
        let encoded = match self.detector.classify(value) {
            Format::Tagged(payload) | Format::Legacy(payload) => payload,
            Format::Plain => return Ok(value.to_owned()),
        };
        let payload = SealedPayload::from_base64(encoded)?;

        let current = self.keys.get_or_derive_key().await?;
        let plain = match decrypt_field(self.provider.as_ref(), &current, &payload) {
            Ok(plain) => plain,
            Err(first) => self.open_with_retired(&payload).await?.ok_or(first)?,
        };

        String::from_utf8(plain)
            .map_err(|_| FieldCryptoError::Decrypt("plaintext is not valid UTF-8".into()))
    }

    /// Decrypt `value`, falling back to `value` itself on failure.
    pub async fn decrypt(&self, value: &str) -> String {
        match self.try_decrypt(value).await {
            Ok(plain) => plain,
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "field decryption failed; value left as stored");
                value.to_owned()
            }
        }
    }

    async fn open_with_retired(
        &self,
        payload: &SealedPayload,
    ) -> Result<Option<Vec<u8>>, FieldCryptoError> {
        for key in self.keys.retired_keys().await? {
            if let Ok(plain) = decrypt_field(self.provider.as_ref(), &key, payload) {
                return Ok(Some(plain));
            }
        }
        Ok(None)
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher")
            .field("detector", &self.detector)
            .finish_non_exhaustive()
    }
}
