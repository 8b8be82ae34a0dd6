//! `fieldseal`: field-level encryption of order and profile PII for the farm
//! shop storefront.
//!
//! Shipping names, addresses, phone numbers, and e-mail addresses are
//! encrypted one field at a time before a record reaches the hosted backend
//! and decrypted after it is read back. Each value is sealed with AES-256-GCM
//! under a key derived from `{app_name}-{hostname}-{year}-{month}` and stored
//! as `ENC1:<base64(iv || ciphertext)>`.
//!
//! Startup sequence for a host application:
//! 1. Load and validate [`Config`] from the environment.
//! 2. Install logging with [`telemetry::init_logging`].
//! 3. Build a [`FieldSeal`], which loads field policies from `policy_dir`.
//! 4. Wrap the backend's [`RecordStore`] with [`FieldSeal::seal`].

pub mod config;
pub mod crypto;
pub mod field;
pub mod key;
pub mod policy;
pub mod record;
pub mod store;
pub mod telemetry;

pub use common::{FieldCryptoError, Format, FormatDetector, Record};
pub use crate::config::Config;
pub use crate::field::FieldCipher;
pub use crate::key::{DerivedKeyProvider, KeyProvider, StaticKeyProvider};
pub use crate::policy::FieldPolicies;
pub use crate::store::{MemoryStore, RecordStore, SealedStore, StoreError, WritePolicy};

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::crypto::{CryptoProvider, RustCryptoProvider};
use crate::key::SystemClock;

/// The field encryption layer wired from configuration.
#[derive(Clone, Debug)]
pub struct FieldSeal {
    cipher: FieldCipher,
    policies: FieldPolicies,
    write_policy: WritePolicy,
}

impl FieldSeal {
    /// Wire the default crypto provider, a month-rotating derived key over the
    /// system clock, and the field policies found in `cfg.policy_dir`.
    ///
    /// No key is derived here; derivation happens on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if `cfg` is invalid or the policy directory cannot be loaded.
    pub async fn from_config(cfg: &Config) -> Result<Self> {
        cfg.validate()?;

        let provider: Arc<dyn CryptoProvider> = Arc::new(RustCryptoProvider);
        let keys = DerivedKeyProvider::new(
            Arc::clone(&provider),
            Arc::new(SystemClock),
            cfg.app_name.clone(),
            cfg.hostname.clone(),
            cfg.kdf_iterations,
            cfg.key_lookback_months,
        );
        let detector = FormatDetector::new(cfg.legacy_detection, cfg.legacy_min_len);
        let cipher = FieldCipher::new(provider, Arc::new(keys), detector);

        let policies = FieldPolicies::new();
        if let Some(dir) = &cfg.policy_dir {
            crate::policy::load_dir(Path::new(dir), &policies).await?;
        }

        let write_policy = if cfg.strict_writes {
            WritePolicy::Strict
        } else {
            WritePolicy::BestEffort
        };

        info!(
            collections = policies.len(),
            strict_writes = cfg.strict_writes,
            legacy_detection = cfg.legacy_detection,
            "field encryption ready"
        );
        Ok(Self::new(cipher, policies, write_policy))
    }

    /// Assemble from parts, e.g. with a [`StaticKeyProvider`] in tests.
    pub fn new(cipher: FieldCipher, policies: FieldPolicies, write_policy: WritePolicy) -> Self {
        Self {
            cipher,
            policies,
            write_policy,
        }
    }

    pub fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    pub fn policies(&self) -> &FieldPolicies {
        &self.policies
    }

    /// Wrap `store` so that policy fields are encrypted at rest.
    pub fn seal<S: RecordStore>(&self, store: S) -> SealedStore<S> {
        SealedStore::new(
            store,
            self.cipher.clone(),
            self.policies.clone(),
            self.write_policy,
        )
    }

    /// Forget every memoized key; the next operation derives afresh.
    pub fn invalidate_keys(&self) {
        self.cipher.keys().invalidate();
    }
}
