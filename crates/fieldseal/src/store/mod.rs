//! Record storage seam and the sealing wrapper that encrypts PII around it.
//!
//! The hosted backend is reached through [`RecordStore`]; this crate ships
//! only [`MemoryStore`]. [`SealedStore`] wraps any store so that every write
//! encrypts the collection's policy fields and every read decrypts them.

pub mod memory;
pub mod sealed;

pub use memory::MemoryStore;
pub use sealed::{SealedStore, WritePolicy};

use async_trait::async_trait;
use common::{FieldCryptoError, Record};
use thiserror::Error;

/// Errors from a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this id exists in the collection.
    #[error("record not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// The backing store failed.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A strict write could not encrypt its PII fields.
    #[error("refusing to store unencrypted PII: {0}")]
    Seal(#[from] FieldCryptoError),
}

/// Create, read, update, and delete records in named collections.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store a new record and return its id.
    async fn create(&self, collection: &str, record: Record) -> Result<String, StoreError>;

    /// Fetch a record by id; `Ok(None)` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError>;

    /// Replace an existing record.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no such record exists.
    async fn update(&self, collection: &str, id: &str, record: Record) -> Result<(), StoreError>;

    /// Remove a record; returns whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// All records of a collection with their ids.
    async fn list(&self, collection: &str) -> Result<Vec<(String, Record)>, StoreError>;
}
