//! In-memory map of collection name to the field paths that must be encrypted.
//!
//! Backed by `arc-swap` so lookups on every record read and write never block,
//! and a reload can swap in a complete new map atomically.

use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;
use thiserror::Error;

use super::resolver::FieldPaths;

/// Errors from the policy cache.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The requested collection has no policy.
    #[error("no field policy for collection: {0}")]
    UnknownCollection(String),
}

/// Shared, lock-free map of field policies keyed by collection.
#[derive(Clone, Debug)]
pub struct FieldPolicies {
    inner: Arc<ArcSwap<HashMap<String, Arc<FieldPaths>>>>,
}

impl FieldPolicies {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(HashMap::new())),
        }
    }

    /// Number of collections with a policy.
    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.load().is_empty()
    }

    /// Look up the policy for `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::UnknownCollection`] if none is registered.
    pub fn get(&self, collection: &str) -> Result<Arc<FieldPaths>, PolicyError> {
        self.inner
            .load()
            .get(collection)
            .cloned()
            .ok_or_else(|| PolicyError::UnknownCollection(collection.to_owned()))
    }

    /// The fields to encrypt in `collection`; empty if it has no policy.
    pub fn fields_for(&self, collection: &str) -> Arc<FieldPaths> {
        self.get(collection).unwrap_or_default()
    }

    /// Register or replace the policy of one collection.
    pub fn insert<I, S>(&self, collection: impl Into<String>, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let collection = collection.into();
        let paths: Arc<FieldPaths> = Arc::new(fields.into_iter().map(Into::into).collect());
        self.inner.rcu(|map| {
            let mut next: HashMap<String, Arc<FieldPaths>> = (**map).clone();
            next.insert(collection.clone(), Arc::clone(&paths));
            next
        });
    }

    /// Atomically replace every policy.
    pub fn replace_all(&self, policies: HashMap<String, FieldPaths>) {
        let next: HashMap<String, Arc<FieldPaths>> = policies
            .into_iter()
            .map(|(collection, paths)| (collection, Arc::new(paths)))
            .collect();
        self.inner.store(Arc::new(next));
    }
}

impl Default for FieldPolicies {
    fn default() -> Self {
        Self::new()
    }
}
