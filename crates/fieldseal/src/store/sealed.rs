//! [`SealedStore`]: encrypt on write, decrypt on read.

use async_trait::async_trait;
use common::Record;
use tracing::debug;

use super::{RecordStore, StoreError};
use crate::field::FieldCipher;
use crate::policy::FieldPolicies;

/// What to do when a PII field cannot be encrypted on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Store the field in plaintext and log. Writes are never blocked.
    #[default]
    BestEffort,
    /// Reject the write with [`StoreError::Seal`].
    Strict,
}

/// A [`RecordStore`] that encrypts each collection's policy fields before
/// delegating a write and decrypts them after a read.
///
/// Collections without a policy pass through untouched. Reads always degrade:
/// a field that fails to decrypt is returned as stored.
#[derive(Clone, Debug)]
pub struct SealedStore<S> {
    inner: S,
    cipher: FieldCipher,
    policies: FieldPolicies,
    write_policy: WritePolicy,
}

impl<S: RecordStore> SealedStore<S> {
    pub fn new(inner: S, cipher: FieldCipher, policies: FieldPolicies, write_policy: WritePolicy) -> Self {
        Self {
            inner,
            cipher,
            policies,
            write_policy,
        }
    }

    /// The wrapped store, which sees ciphertext.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn seal(&self, collection: &str, record: Record) -> Result<Record, StoreError> {
        let paths = self.policies.fields_for(collection);
        if paths.is_empty() {
            debug!(collection, "no field policy; storing record as-is");
            return Ok(record);
        }
        let fields: Vec<&str> = paths.iter().map(String::as_str).collect();
        match self.write_policy {
            WritePolicy::BestEffort => Ok(self.cipher.encrypt_fields(&record, &fields).await),
            WritePolicy::Strict => Ok(self.cipher.try_encrypt_fields(&record, &fields).await?),
        }
    }

    async fn open(&self, collection: &str, record: Record) -> Record {
        let paths = self.policies.fields_for(collection);
        if paths.is_empty() {
            return record;
        }
        let fields: Vec<&str> = paths.iter().map(String::as_str).collect();
        self.cipher.decrypt_fields(&record, &fields).await
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for SealedStore<S> {
    async fn create(&self, collection: &str, record: Record) -> Result<String, StoreError> {
        let sealed = self.seal(collection, record).await?;
        self.inner.create(collection, sealed).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
        match self.inner.get(collection, id).await? {
            Some(record) => Ok(Some(self.open(collection, record).await)),
            None => Ok(None),
        }
    }

    async fn update(&self, collection: &str, id: &str, record: Record) -> Result<(), StoreError> {
        let sealed = self.seal(collection, record).await?;
        self.inner.update(collection, id, sealed).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.inner.delete(collection, id).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Record)>, StoreError> {
        let stored = self.inner.list(collection).await?;
        let mut out = Vec::with_capacity(stored.len());
        for (id, record) in stored {
            out.push((id, self.open(collection, record).await));
        }
        Ok(out)
    }
}
