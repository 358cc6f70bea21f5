//! Quarry Backend - Key-Value Store Abstraction
//!
//! Defines the store interface the document engine is written against and
//! the in-memory implementation. Keys are ordered bytewise so `scan_all`
//! always yields entries in ascending key order.
//!
//! Individual `get`/`set` calls are atomic. Nothing spans more than one key;
//! callers that need read-modify-write must bring their own locking.
//!
//! @version 0.1.0
//! @author Quarry Development Team

use async_trait::async_trait;
use parking_lot::RwLock;
use quarry_common::Result;
use std::collections::BTreeMap;

// =============================================================================
// Store Trait
// =============================================================================

/// Ordered byte-key/byte-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Write `value` under `key`. When `durable` is set the write is on
    /// stable storage before this returns.
    async fn set(&self, key: &[u8], value: &[u8], durable: bool) -> Result<()>;

    /// Snapshot of every entry in ascending key order.
    async fn scan_all(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Number of keys currently stored.
    fn len(&self) -> usize;

    /// Check if the store holds no keys.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get store statistics.
    fn stats(&self) -> StoreStats;
}

// =============================================================================
// Store Statistics
// =============================================================================

/// Operation counters for a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub read_ops: u64,
    pub write_ops: u64,
    pub durable_writes: u64,
    pub scans: u64,
    pub total_bytes: u64,
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory store for testing and development.
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    stats: RwLock<StoreStats>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            stats: RwLock::new(StoreStats::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self.entries.read().get(key).cloned();
        self.stats.write().read_ops += 1;
        Ok(value)
    }

    async fn set(&self, key: &[u8], value: &[u8], durable: bool) -> Result<()> {
        let previous = self.entries.write().insert(key.to_vec(), value.to_vec());

        let mut stats = self.stats.write();
        stats.write_ops += 1;
        if durable {
            stats.durable_writes += 1;
        }
        match previous {
            Some(old) => {
                stats.total_bytes = stats.total_bytes - old.len() as u64 + value.len() as u64;
            }
            None => stats.total_bytes += (key.len() + value.len()) as u64,
        }
        Ok(())
    }

    async fn scan_all(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let snapshot = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.stats.write().scans += 1;
        Ok(snapshot)
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn stats(&self) -> StoreStats {
        self.stats.read().clone()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_get_set() {
        let store = MemoryStore::new();
        assert!(store.get(b"missing").await.unwrap().is_none());

        store.set(b"k1", b"v1", false).await.unwrap();
        assert_eq!(store.get(b"k1").await.unwrap(), Some(b"v1".to_vec()));

        store.set(b"k1", b"v2", true).await.unwrap();
        assert_eq!(store.get(b"k1").await.unwrap(), Some(b"v2".to_vec()));
        assert_eq!(store.len(), 1);

        let stats = store.stats();
        assert_eq!(stats.write_ops, 2);
        assert_eq!(stats.durable_writes, 1);
        assert_eq!(stats.read_ops, 3);
    }

    #[tokio::test]
    async fn test_memory_store_scan_is_ordered() {
        let store = MemoryStore::new();
        for key in ["c", "a", "b"] {
            store.set(key.as_bytes(), b"x", false).await.unwrap();
        }

        let keys: Vec<Vec<u8>> = store
            .scan_all()
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[tokio::test]
    async fn test_scan_is_a_snapshot() {
        let store = MemoryStore::new();
        store.set(b"a", b"1", false).await.unwrap();

        let snapshot = store.scan_all().await.unwrap();
        store.set(b"b", b"2", false).await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.scan_all().await.unwrap().len(), 2);
    }
}
