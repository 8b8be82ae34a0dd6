//! Field encryption keys: derivation, memoization, and month rotation.
//!
//! # Lifecycle
//!
//! 1. The first encrypt or decrypt in a month calls
//!    [`KeyProvider::get_or_derive_key`], which builds the seed
//!    `{app_name}-{hostname}-{year}-{month}` and stretches it with
//!    PBKDF2-HMAC-SHA256 over the fixed [`SALT`].
//! 2. The derived key is memoized for that month; later calls read it without
//!    locking.
//! 3. When the clock crosses into a new month the next call derives a fresh key.
//!    Keys of up to `lookback_months` earlier months stay reachable through
//!    [`KeyProvider::retired_keys`] so recent ciphertext remains readable.
//! 4. [`KeyProvider::invalidate`] forgets every memoized key.
//!
//! # Security invariants
//!
//! - Key bytes and seeds are **never** persisted, logged, or printed by `Debug`.
//! - Key buffers are zeroed when the last reference is dropped.

pub mod seed;
pub mod store;

pub use seed::{Clock, FixedClock, KeyBucket, KeySeed, SystemClock, MIN_KDF_ITERATIONS, SALT};
pub use store::DerivedKeyProvider;

use std::sync::Arc;

use async_trait::async_trait;
use common::FieldCryptoError;

use crate::crypto::KEY_LEN;

/// A 256-bit AES key held only in memory.
///
/// When this type is dropped, the memory is overwritten with zeroes.
pub struct EncryptionKey(Box<[u8; KEY_LEN]>);

impl EncryptionKey {
    /// Take ownership of raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Box::new(bytes))
    }

    /// Borrow the raw key bytes for the cipher.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// Supplies the key used to seal new values and the keys tried when opening.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// The key for new ciphertext, derived on first use and memoized.
    async fn get_or_derive_key(&self) -> Result<Arc<EncryptionKey>, FieldCryptoError>;

    /// Older keys still accepted for decryption, newest first.
    async fn retired_keys(&self) -> Result<Vec<Arc<EncryptionKey>>, FieldCryptoError> {
        Ok(Vec::new())
    }

    /// Drop every memoized key so the next call derives afresh.
    fn invalidate(&self);
}

/// A [`KeyProvider`] that always returns the same key.
#[derive(Debug, Clone)]
pub struct StaticKeyProvider {
    key: Arc<EncryptionKey>,
}

impl StaticKeyProvider {
    pub fn new(key: EncryptionKey) -> Self {
        Self { key: Arc::new(key) }
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn get_or_derive_key(&self) -> Result<Arc<EncryptionKey>, FieldCryptoError> {
        Ok(Arc::clone(&self.key))
    }

    // Nothing to forget.
    fn invalidate(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_redacted_in_debug() {
        let mut bytes = [0u8; KEY_LEN];
        bytes[0] = 0xFF;
        let key = EncryptionKey::from_bytes(bytes);
        assert_eq!(format!("{key:?}"), "EncryptionKey([REDACTED])");
    }

    #[tokio::test]
    async fn static_provider_returns_same_key() {
        let keys = StaticKeyProvider::new(EncryptionKey::from_bytes([9u8; KEY_LEN]));
        let a = keys.get_or_derive_key().await.unwrap();
        keys.invalidate();
        let b = keys.get_or_derive_key().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.as_bytes(), &[9u8; KEY_LEN]);
        assert!(keys.retired_keys().await.unwrap().is_empty());
    }
}
