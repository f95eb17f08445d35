use crate::detector_core::store_backend::{KvStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;

/// In-memory store for dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
    connected: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn connect(&mut self, _conn: &str) -> Result<(), StoreError> {
        self.connected = true;
        Ok(())
    }

    async fn insert(&mut self, key: &str, value: &[u8]) -> Result<u64, StoreError> {
        if !self.connected {
            return Err(StoreError::NotConnected);
        }
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(1)
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        log::debug!("Memory store closed with {} entries", self.entries.len());
        self.connected = false;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "Memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_overwrite() {
        let mut store = MemoryStore::new();
        store.connect("").await.unwrap();

        store.insert("k", b"a").await.unwrap();
        store.insert("k", b"b").await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k"), Some(&b"b"[..]));
    }

    #[tokio::test]
    async fn test_memory_requires_connect() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.insert("k", b"a").await,
            Err(StoreError::NotConnected)
        ));
    }
}
