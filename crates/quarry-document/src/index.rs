//! Quarry Document Index
//!
//! Secondary index from literal `path=value` text to the set of documents
//! holding that pair at a scalar leaf. Entries only ever grow.
//!
//! Updating an entry is read-modify-write against a store that offers no
//! compare-and-swap, so every update holds the mutex of the stripe its key
//! hashes to for the whole read-modify-write. Two documents sharing a
//! `path=value` pair therefore cannot overwrite each other's IDs. Only one
//! stripe is ever held at a time.
//!
//! @version 0.1.0
//! @author Quarry Development Team

use crate::flatten::path_values;
use crate::types::{DocumentId, Value};
use quarry_common::utils::stripe_for;
use quarry_common::{QuarryError, Result};
use quarry_storage::KvStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

// =============================================================================
// Index Key
// =============================================================================

/// Index key for a scalar found at `path`.
pub fn index_key(path: &str, value: &Value) -> String {
    format!("{}={}", path, value)
}

fn decode_entry(key: &str, bytes: &[u8]) -> Result<BTreeSet<String>> {
    serde_json::from_slice(bytes).map_err(|e| {
        QuarryError::Corruption(format!("index entry [{}] is unreadable: {}", key, e))
    })
}

fn encode_entry(ids: &BTreeSet<String>) -> Result<Vec<u8>> {
    serde_json::to_vec(ids).map_err(QuarryError::from)
}

// =============================================================================
// Secondary Index
// =============================================================================

/// What indexing one document changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexOutcome {
    /// Index keys derived from the document.
    pub keys: usize,
    /// Keys whose ID set did not already contain the document.
    pub added: usize,
}

/// Lock-striped secondary index over a key-value store.
pub struct SecondaryIndex {
    store: Arc<dyn KvStore>,
    stripes: Vec<Mutex<()>>,
    durable: bool,
}

impl SecondaryIndex {
    /// Create an index over `store` guarded by `lock_stripes` mutexes.
    pub fn new(store: Arc<dyn KvStore>, lock_stripes: usize) -> Self {
        let stripes = (0..lock_stripes.max(1)).map(|_| Mutex::new(())).collect();
        Self {
            store,
            stripes,
            durable: true,
        }
    }

    /// Control whether entry writes are flushed to stable storage.
    pub fn with_durability(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Record every scalar leaf of `document` under `id`. Re-indexing a
    /// document that is already present changes nothing.
    pub async fn index_document(&self, id: &DocumentId, document: &Value) -> Result<IndexOutcome> {
        let mut outcome = IndexOutcome::default();

        for (path, value) in path_values(document) {
            let key = index_key(&path, value);
            outcome.keys += 1;
            if self.add_to_entry(&key, id).await? {
                outcome.added += 1;
            }
        }

        Ok(outcome)
    }

    /// Add `id` to the entry for `key`. Returns false if it was already there.
    pub async fn add_to_entry(&self, key: &str, id: &DocumentId) -> Result<bool> {
        let stripe = stripe_for(key.as_bytes(), self.stripes.len());
        let _guard = self.stripes[stripe].lock().await;

        let mut ids = match self.store.get(key.as_bytes()).await? {
            Some(bytes) => decode_entry(key, &bytes)?,
            None => BTreeSet::new(),
        };

        if !ids.insert(id.as_str().to_string()) {
            return Ok(false);
        }

        let bytes = encode_entry(&ids)?;
        self.store.set(key.as_bytes(), &bytes, self.durable).await?;
        tracing::debug!("Index entry [{}] now holds {} ids", key, ids.len());
        Ok(true)
    }

    /// IDs recorded under `key`, ascending.
    pub async fn lookup(&self, key: &str) -> Result<Vec<DocumentId>> {
        match self.store.get(key.as_bytes()).await? {
            Some(bytes) => Ok(decode_entry(key, &bytes)?
                .into_iter()
                .map(DocumentId::from)
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    /// Number of distinct `path=value` entries.
    pub fn key_count(&self) -> usize {
        self.store.len()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_storage::MemoryStore;

    fn new_index(stripes: usize) -> (Arc<MemoryStore>, SecondaryIndex) {
        let store = Arc::new(MemoryStore::new());
        let index = SecondaryIndex::new(store.clone(), stripes);
        (store, index)
    }

    fn doc(json: serde_json::Value) -> Value {
        Value::from_json(json)
    }

    #[test]
    fn test_index_key() {
        assert_eq!(index_key("a.b", &Value::Int(12)), "a.b=12");
        assert_eq!(index_key("name", &Value::from("john doe")), "name=john doe");
        assert_eq!(index_key("ratio", &Value::Float(1.0)), "ratio=1.0");
        assert_eq!(index_key("ok", &Value::Bool(true)), "ok=true");
    }

    #[tokio::test]
    async fn test_index_and_lookup() {
        let (_, index) = new_index(8);
        let body = doc(serde_json::json!({"a": {"b": 12}, "name": "john doe"}));

        let outcome = index
            .index_document(&DocumentId::new("doc1"), &body)
            .await
            .unwrap();
        assert_eq!(outcome, IndexOutcome { keys: 2, added: 2 });

        assert_eq!(
            index.lookup("a.b=12").await.unwrap(),
            vec![DocumentId::new("doc1")]
        );
        assert_eq!(
            index.lookup("name=john doe").await.unwrap(),
            vec![DocumentId::new("doc1")]
        );
        assert!(index.lookup("a.b=13").await.unwrap().is_empty());
        assert_eq!(index.key_count(), 2);
    }

    #[tokio::test]
    async fn test_shared_entry_and_idempotence() {
        let (store, index) = new_index(4);
        let body = doc(serde_json::json!({"status": "active"}));

        index.index_document(&DocumentId::new("b"), &body).await.unwrap();
        index.index_document(&DocumentId::new("a"), &body).await.unwrap();
        let writes = store.stats().write_ops;

        let again = index
            .index_document(&DocumentId::new("a"), &body)
            .await
            .unwrap();
        assert_eq!(again, IndexOutcome { keys: 1, added: 0 });
        assert_eq!(store.stats().write_ops, writes);

        assert_eq!(
            index.lookup("status=active").await.unwrap(),
            vec![DocumentId::new("a"), DocumentId::new("b")]
        );
    }

    #[tokio::test]
    async fn test_arrays_never_indexed() {
        let (store, index) = new_index(4);
        let body = doc(serde_json::json!({
            "tags": ["x"],
            "items": [{"sku": 7}],
            "keep": 1
        }));

        index.index_document(&DocumentId::new("d"), &body).await.unwrap();

        let keys: Vec<String> = store
            .scan_all()
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| String::from_utf8(k).unwrap())
            .collect();
        assert_eq!(keys, vec!["keep=1".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_entry() {
        let (store, index) = new_index(4);
        store.set(b"k=v", b"not json", false).await.unwrap();

        assert!(matches!(
            index.lookup("k=v").await,
            Err(QuarryError::Corruption(_))
        ));
        assert!(index
            .add_to_entry("k=v", &DocumentId::new("x"))
            .await
            .is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_updates_to_one_key() {
        const WRITERS: usize = 64;

        // A single stripe puts every key under the same mutex; 16 stripes
        // still route the shared key to one of them.
        for stripes in [1, 16] {
            let (_, index) = new_index(stripes);
            let index = Arc::new(index);
            let body = Arc::new(doc(serde_json::json!({"shared": "yes"})));

            let mut handles = Vec::with_capacity(WRITERS);
            for i in 0..WRITERS {
                let index = index.clone();
                let body = body.clone();
                handles.push(tokio::spawn(async move {
                    let id = DocumentId::new(format!("doc-{:03}", i));
                    index.index_document(&id, &body).await
                }));
            }
            for handle in handles {
                handle.await.unwrap().unwrap();
            }

            assert_eq!(index.lookup("shared=yes").await.unwrap().len(), WRITERS);
        }
    }
}
