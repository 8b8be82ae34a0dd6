//! AES-256-GCM field encryption primitives and the crypto provider seam.
//!
//! This module is free of storage and policy concerns. It seals and opens
//! single field values under a given key; choosing the key is the job of
//! [`crate::key`].

pub mod cipher;
pub mod provider;

pub use cipher::{decrypt_field, encrypt_field};
pub use provider::{CryptoProvider, ProviderError, RustCryptoProvider, KEY_LEN};
