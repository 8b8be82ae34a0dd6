//! Common types, the ciphertext envelope format, and errors shared across `fieldseal` crates.
//!
//! Nothing here depends on a cipher implementation: this crate only knows how
//! encrypted field values are laid out and how to recognise them.

pub mod envelope;
pub mod error;

pub use envelope::{Format, FormatDetector, SealedPayload};
pub use error::FieldCryptoError;

/// A stored record: field name to JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;
