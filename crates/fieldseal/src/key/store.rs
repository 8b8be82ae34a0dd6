//! [`DerivedKeyProvider`]: month-rotating keys derived from the deployment seed.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use common::FieldCryptoError;
use tracing::debug;

use super::seed::{Clock, KeyBucket, KeySeed, SALT};
use super::{EncryptionKey, KeyProvider};
use crate::crypto::CryptoProvider;

/// Memo of derived keys, keyed by month bucket.
type KeyMap = HashMap<KeyBucket, Arc<EncryptionKey>>;

/// Derives one key per calendar month and memoizes it.
///
/// Reads go through [`ArcSwap`] so concurrent callers never block. Two callers
/// racing on the first use of a month may both run PBKDF2; the first insert
/// wins and the other result is discarded.
#[derive(Clone)]
pub struct DerivedKeyProvider {
    provider: Arc<dyn CryptoProvider>,
    clock: Arc<dyn Clock>,
    app_name: Arc<str>,
    hostname: Arc<str>,
    iterations: u32,
    lookback_months: u32,
    keys: Arc<ArcSwap<KeyMap>>,
}

impl DerivedKeyProvider {
    /// Create a provider. No key is derived until first use.
    pub fn new(
        provider: Arc<dyn CryptoProvider>,
        clock: Arc<dyn Clock>,
        app_name: impl Into<String>,
        hostname: impl Into<String>,
        iterations: u32,
        lookback_months: u32,
    ) -> Self {
        Self {
            provider,
            clock,
            app_name: Arc::from(app_name.into()),
            hostname: Arc::from(hostname.into()),
            iterations,
            lookback_months,
            keys: Arc::new(ArcSwap::from_pointee(HashMap::new())),
        }
    }

    /// The bucket new ciphertext is sealed under right now.
    pub fn current_bucket(&self) -> KeyBucket {
        KeyBucket::containing(self.clock.now())
    }

    /// Number of month keys currently memoized.
    pub fn cached_len(&self) -> usize {
        self.keys.load().len()
    }

    async fn key_for(&self, bucket: KeyBucket) -> Result<Arc<EncryptionKey>, FieldCryptoError> {
        if let Some(key) = self.keys.load().get(&bucket) {
            return Ok(Arc::clone(key));
        }

        let seed = KeySeed::new(&self.app_name, &self.hostname, bucket);
        let provider = Arc::clone(&self.provider);
        let iterations = self.iterations;
        // PBKDF2 is deliberately slow; keep it off the async worker threads.
        let bytes = tokio::task::spawn_blocking(move || {
            provider.derive_key(seed.as_bytes(), &SALT, iterations)
        })
        .await
        .map_err(|e| FieldCryptoError::KeyDerivation(format!("derivation task failed: {e}")))?
        .map_err(|e| FieldCryptoError::KeyDerivation(e.to_string()))?;

        let derived = Arc::new(EncryptionKey::from_bytes(bytes));
        let current = self.current_bucket();
        let window = i64::from(self.lookback_months);
        self.keys.rcu(|map| {
            let mut next: KeyMap = map
                .iter()
                .filter(|(b, _)| (0..=window).contains(&current.months_since(**b)))
                .map(|(b, k)| (*b, Arc::clone(k)))
                .collect();
            next.entry(bucket).or_insert_with(|| Arc::clone(&derived));
            next
        });
        debug!(
            year = bucket.year(),
            month = bucket.month(),
            "derived field encryption key"
        );

        Ok(self
            .keys
            .load()
            .get(&bucket)
            .cloned()
            .unwrap_or(derived))
    }
}

#[async_trait]
impl KeyProvider for DerivedKeyProvider {
    async fn get_or_derive_key(&self) -> Result<Arc<EncryptionKey>, FieldCryptoError> {
        self.key_for(self.current_bucket()).await
    }

    async fn retired_keys(&self) -> Result<Vec<Arc<EncryptionKey>>, FieldCryptoError> {
        let mut bucket = self.current_bucket();
        let mut keys = Vec::with_capacity(self.lookback_months as usize);
        for _ in 0..self.lookback_months {
            bucket = bucket.previous();
            keys.push(self.key_for(bucket).await?);
        }
        Ok(keys)
    }

    fn invalidate(&self) {
        self.keys.store(Arc::new(HashMap::new()));
    }
}

impl std::fmt::Debug for DerivedKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeyProvider")
            .field("app_name", &self.app_name)
            .field("iterations", &self.iterations)
            .field("lookback_months", &self.lookback_months)
            .field("cached", &self.cached_len())
            .finish_non_exhaustive()
    }
}
