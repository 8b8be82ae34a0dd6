//! [`MemoryStore`]: an in-process [`RecordStore`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use common::Record;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RecordStore, StoreError};

type Collections = HashMap<String, BTreeMap<String, Record>>;

/// Record store held in memory behind an `Arc<RwLock<_>>`.
///
/// Ids are random UUID v4 strings; [`RecordStore::list`] returns records in id
/// order.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, collection: &str, record: Record) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let mut lock = self.inner.write().await;
        lock.entry(collection.to_owned())
            .or_default()
            .insert(id.clone(), record);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
        let lock = self.inner.read().await;
        Ok(lock.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn update(&self, collection: &str, id: &str, record: Record) -> Result<(), StoreError> {
        let mut lock = self.inner.write().await;
        match lock.get_mut(collection).and_then(|c| c.get_mut(id)) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                collection: collection.to_owned(),
                id: id.to_owned(),
            }),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut lock = self.inner.write().await;
        Ok(lock
            .get_mut(collection)
            .is_some_and(|c| c.remove(id).is_some()))
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Record)>, StoreError> {
        let lock = self.inner.read().await;
        Ok(lock
            .get(collection)
            .map(|c| c.iter().map(|(id, r)| (id.clone(), r.clone())).collect())
            .unwrap_or_default())
    }
}
