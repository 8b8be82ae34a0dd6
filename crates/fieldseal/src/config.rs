//! Configuration loading and validation.
//!
//! Values are read from `FIELDSEAL_*` environment variables. Loading fails
//! with a descriptive error if a required variable is missing or invalid.

use anyhow::{Context, Result};
use serde::Deserialize;

use common::envelope::DEFAULT_LEGACY_MIN_LEN;

use crate::key::MIN_KDF_ITERATIONS;

/// Upper bound on how many earlier months of keys are kept for decryption.
pub const MAX_KEY_LOOKBACK_MONTHS: u32 = 12;

/// Validated field encryption configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Fixed application identifier mixed into the key seed. **Required.**
    pub app_name: String,

    /// Deployment host name mixed into the key seed. **Required.**
    pub hostname: String,

    /// PBKDF2-HMAC-SHA256 iteration count.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// How many earlier months of keys are still tried on decryption.
    #[serde(default = "default_key_lookback_months")]
    pub key_lookback_months: u32,

    /// Whether untagged base64-shaped values are treated as legacy ciphertext.
    #[serde(default = "default_legacy_detection")]
    pub legacy_detection: bool,

    /// Untagged values must be longer than this to count as legacy ciphertext.
    #[serde(default = "default_legacy_min_len")]
    pub legacy_min_len: usize,

    /// Reject record writes whose PII fields cannot be encrypted instead of
    /// storing them in plaintext.
    #[serde(default)]
    pub strict_writes: bool,

    /// Directory of OpenAPI documents declaring `x-pii` fields per collection.
    #[serde(default)]
    pub policy_dir: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_kdf_iterations() -> u32 {
    MIN_KDF_ITERATIONS
}
fn default_key_lookback_months() -> u32 {
    1
}
fn default_legacy_detection() -> bool {
    true
}
fn default_legacy_min_len() -> usize {
    DEFAULT_LEGACY_MIN_LEN
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from `FIELDSEAL_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix("FIELDSEAL").try_parsing(true))
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    pub fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.app_name, "FIELDSEAL_APP_NAME")?;
        ensure_non_empty(&self.hostname, "FIELDSEAL_HOSTNAME")?;

        if self.kdf_iterations < MIN_KDF_ITERATIONS {
            anyhow::bail!("FIELDSEAL_KDF_ITERATIONS must be at least {MIN_KDF_ITERATIONS}");
        }
        if self.key_lookback_months > MAX_KEY_LOOKBACK_MONTHS {
            anyhow::bail!("FIELDSEAL_KEY_LOOKBACK_MONTHS must be at most {MAX_KEY_LOOKBACK_MONTHS}");
        }
        if let Some(dir) = &self.policy_dir {
            ensure_non_empty(dir, "FIELDSEAL_POLICY_DIR")?;
        }
        Ok(())
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
