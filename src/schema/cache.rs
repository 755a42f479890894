//! Schema cache
//!
//! Built schemas keyed by type identity. Lookups take a read lock; a miss
//! builds outside any lock and then inserts unless another builder got there
//! first, so concurrent builders of the same entry race harmlessly and every
//! caller ends up with the same `Arc`. Readers only ever see complete entries.

use super::Schema;
use crate::error::Result;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

static GLOBAL: Lazy<SchemaCache> = Lazy::new(SchemaCache::new);

/// Read-through cache of built schemas
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: RwLock<HashMap<TypeId, Arc<Schema>>>,
}

impl SchemaCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache
    pub fn global() -> &'static SchemaCache {
        &GLOBAL
    }

    /// Get a cached schema
    pub fn get(&self, key: TypeId) -> Option<Arc<Schema>> {
        self.entries.read().get(&key).cloned()
    }

    /// Get a cached schema, building and inserting it on a miss
    pub fn get_or_build<F>(&self, key: TypeId, build: F) -> Result<Arc<Schema>>
    where
        F: FnOnce() -> Result<Schema>,
    {
        if let Some(schema) = self.get(key) {
            return Ok(schema);
        }

        let built = Arc::new(build()?);
        let mut entries = self.entries.write();
        let schema = entries.entry(key).or_insert_with(|| {
            tracing::trace!(root = built.root().name(), "caching schema");
            Arc::clone(&built)
        });
        Ok(Arc::clone(schema))
    }

    /// Number of cached schemas
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
