//! In-memory backend for tests and ephemeral runs.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::{StoreBackend, StoreError};

/// A thread-safe map of key to JSON blob.
#[derive(Default)]
pub struct MemoryBackend {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryBackend {
    fn insert(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut data = self.data.write();
        if data.contains_key(key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        data.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.data
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn replace(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut data = self.data.write();
        match data.get_mut(key) {
            Some(slot) => {
                *slot = value.to_vec();
                Ok(())
            }
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    fn remove(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.data
            .write()
            .remove(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn scan(&self, prefix: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        Ok(self
            .data
            .read()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(_, v)| v.clone())
            .collect())
    }
}
