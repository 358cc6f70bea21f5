//! Quarry Document Engine
//!
//! Core engine that coordinates all document store operations: ingestion,
//! point lookups, search, and start-up re-indexing.
//!
//! Search answers equality comparisons from the secondary index when it can.
//! The IDs present under every equality key are loaded and checked against
//! the ordering comparisons only. When that intersection is empty, when the
//! query has no equality comparisons, or when the caller bypasses the index,
//! every stored document is scanned and matched against the whole query.
//!
//! @version 0.1.0
//! @author Quarry Development Team

use crate::index::{IndexOutcome, SecondaryIndex};
use crate::query::{Comparison, Query};
use crate::types::{Document, DocumentId, Value};
use parking_lot::RwLock;
use quarry_common::{QuarryConfig, QuarryError, Result};
use quarry_storage::{KvStore, LogStore, MemoryStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

pub const DOCUMENTS_FILE: &str = "documents.log";
pub const INDEX_FILE: &str = "index.log";

// =============================================================================
// Document Engine Configuration
// =============================================================================

/// Configuration for the document engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_document_size: usize,
    pub durable_writes: bool,
    pub lock_stripes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&QuarryConfig::default())
    }
}

impl From<&QuarryConfig> for EngineConfig {
    fn from(config: &QuarryConfig) -> Self {
        Self {
            max_document_size: config.limits.max_document_size,
            durable_writes: config.storage.sync_writes,
            lock_stripes: config.index.lock_stripes,
        }
    }
}

// =============================================================================
// Search Types
// =============================================================================

/// Caller controls for a search.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    /// Ignore the secondary index and scan every document.
    pub skip_index: bool,
}

/// How a search was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPlan {
    Index,
    FullScan,
}

/// Result of a search, ordered by ascending document ID.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub documents: Vec<Document>,
    pub plan: SearchPlan,
    pub total_scanned: usize,
    pub execution_time_ms: u64,
}

impl SearchResult {
    pub fn count(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn ids(&self) -> Vec<&DocumentId> {
        self.documents.iter().map(|d| &d.id).collect()
    }
}

/// Summary of a re-index pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    pub documents: usize,
    pub skipped: usize,
    pub entries_added: usize,
}

// =============================================================================
// Document Engine
// =============================================================================

/// The main document storage and query engine.
pub struct DocumentEngine {
    config: EngineConfig,
    documents: Arc<dyn KvStore>,
    index: SecondaryIndex,
    stats: RwLock<EngineStats>,
}

impl DocumentEngine {
    /// Create an engine over explicit document and index stores.
    pub fn new(
        documents: Arc<dyn KvStore>,
        index_store: Arc<dyn KvStore>,
        config: EngineConfig,
    ) -> Self {
        let index = SecondaryIndex::new(index_store, config.lock_stripes)
            .with_durability(config.durable_writes);
        Self {
            config,
            documents,
            index,
            stats: RwLock::new(EngineStats::default()),
        }
    }

    /// Create an engine backed by in-memory stores.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            EngineConfig::default(),
        )
    }

    /// Open the stores named by `config`: log files under the data
    /// directory, or memory when none is set.
    pub fn open(config: &QuarryConfig) -> Result<Self> {
        let dir = config.storage.data_directory.as_deref();
        let documents = open_store(dir, DOCUMENTS_FILE)?;
        let index_store = open_store(dir, INDEX_FILE)?;
        Ok(Self::new(documents, index_store, EngineConfig::from(config)))
    }

    pub fn index(&self) -> &SecondaryIndex {
        &self.index
    }

    // -------------------------------------------------------------------------
    // Document Operations
    // -------------------------------------------------------------------------

    /// Store a document and index it, returning its new ID.
    ///
    /// The index is only touched once the document write has returned. An
    /// indexing failure after that point is logged rather than returned: the
    /// document exists and the next re-index pass will cover it.
    pub async fn insert(&self, body: Value) -> Result<DocumentId> {
        if !body.is_object() {
            return Err(QuarryError::Decode(
                "document must be a JSON object".to_string(),
            ));
        }

        let bytes = body.encode()?;
        if bytes.len() > self.config.max_document_size {
            return Err(QuarryError::DocumentTooLarge {
                size: bytes.len(),
                limit: self.config.max_document_size,
            });
        }

        let id = DocumentId::generate();
        self.documents
            .set(id.as_bytes(), &bytes, self.config.durable_writes)
            .await?;

        match self.index.index_document(&id, &body).await {
            Ok(outcome) => {
                tracing::debug!("Indexed document {} under {} keys", id, outcome.keys);
            }
            Err(e) => {
                tracing::error!("Stored document {} but failed to index it: {}", id, e);
                self.stats.write().index_failures += 1;
            }
        }

        self.stats.write().documents_inserted += 1;
        Ok(id)
    }

    /// Store a document given as decoded JSON.
    pub async fn insert_json(&self, json: serde_json::Value) -> Result<DocumentId> {
        self.insert(Value::from_json(json)).await
    }

    /// Store a document given as raw JSON bytes.
    pub async fn insert_bytes(&self, bytes: &[u8]) -> Result<DocumentId> {
        self.insert(Value::decode(bytes)?).await
    }

    /// Get a document by ID.
    pub async fn get(&self, id: &DocumentId) -> Result<Document> {
        let bytes = self
            .documents
            .get(id.as_bytes())
            .await?
            .ok_or_else(|| QuarryError::NotFound(id.to_string()))?;

        Ok(Document::new(id.clone(), Value::decode(&bytes)?))
    }

    /// Number of stored documents.
    pub fn count(&self) -> usize {
        self.documents.len()
    }

    // -------------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------------

    /// Parse `query` and run it.
    pub async fn search_str(&self, query: &str, options: SearchOptions) -> Result<SearchResult> {
        let query = Query::parse(query)?;
        self.search(&query, options).await
    }

    /// Find every document matching `query`.
    pub async fn search(&self, query: &Query, options: SearchOptions) -> Result<SearchResult> {
        let start = Instant::now();

        let (equalities, orderings): (Vec<&Comparison>, Vec<&Comparison>) =
            query.comparisons().iter().partition(|c| c.is_equality());

        let candidates = if options.skip_index {
            Vec::new()
        } else {
            self.equality_candidates(&equalities).await?
        };

        let (documents, plan, total_scanned) = if candidates.is_empty() {
            let (documents, scanned) = self.full_scan(query).await?;
            (documents, SearchPlan::FullScan, scanned)
        } else {
            let scanned = candidates.len();
            let documents = self.load_candidates(candidates, &orderings).await?;
            (documents, SearchPlan::Index, scanned)
        };

        {
            let mut stats = self.stats.write();
            match plan {
                SearchPlan::Index => stats.index_searches += 1,
                SearchPlan::FullScan => stats.full_scans += 1,
            }
        }

        tracing::debug!(
            "Search [{}] answered by {:?}: {} of {} documents matched",
            query,
            plan,
            documents.len(),
            total_scanned
        );

        Ok(SearchResult {
            documents,
            plan,
            total_scanned,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// IDs listed under every equality key, ascending.
    async fn equality_candidates(&self, equalities: &[&Comparison]) -> Result<Vec<DocumentId>> {
        if equalities.is_empty() {
            return Ok(Vec::new());
        }

        let mut tally: BTreeMap<DocumentId, usize> = BTreeMap::new();
        for comparison in equalities {
            for id in self.index.lookup(&comparison.index_key()).await? {
                *tally.entry(id).or_insert(0) += 1;
            }
        }

        Ok(tally
            .into_iter()
            .filter(|(_, hits)| *hits == equalities.len())
            .map(|(id, _)| id)
            .collect())
    }

    async fn load_candidates(
        &self,
        candidates: Vec<DocumentId>,
        orderings: &[&Comparison],
    ) -> Result<Vec<Document>> {
        let mut documents = Vec::with_capacity(candidates.len());

        for id in candidates {
            let Some(bytes) = self.documents.get(id.as_bytes()).await? else {
                tracing::warn!("Index refers to missing document {}", id);
                continue;
            };
            let body = Value::decode(&bytes)?;
            if orderings.iter().all(|c| c.matches(&body)) {
                documents.push(Document::new(id, body));
            }
        }

        Ok(documents)
    }

    async fn full_scan(&self, query: &Query) -> Result<(Vec<Document>, usize)> {
        let entries = self.documents.scan_all().await?;
        let scanned = entries.len();

        let mut documents = Vec::new();
        for (key, value) in entries {
            let document = Document::from_entry(&key, &value)?;
            if query.matches(&document.body) {
                documents.push(document);
            }
        }

        Ok((documents, scanned))
    }

    // -------------------------------------------------------------------------
    // Re-indexing
    // -------------------------------------------------------------------------

    /// Derive index entries for every stored document. Documents that cannot
    /// be decoded or indexed are logged and skipped. Safe to run repeatedly.
    pub async fn reindex(&self) -> Result<ReindexReport> {
        let start = Instant::now();
        let entries = self.documents.scan_all().await?;
        tracing::info!("Re-indexing {} stored documents", entries.len());

        let mut report = ReindexReport::default();
        for (key, value) in entries {
            match self.reindex_entry(&key, &value).await {
                Ok(outcome) => {
                    report.documents += 1;
                    report.entries_added += outcome.added;
                }
                Err(e) => {
                    tracing::warn!(
                        "Skipping document {} during re-index: {}",
                        String::from_utf8_lossy(&key),
                        e
                    );
                    report.skipped += 1;
                }
            }
        }

        self.stats.write().reindex_runs += 1;
        tracing::info!(
            "Re-index finished in {}ms: {} indexed, {} skipped, {} new entries",
            start.elapsed().as_millis(),
            report.documents,
            report.skipped,
            report.entries_added
        );
        Ok(report)
    }

    async fn reindex_entry(&self, key: &[u8], value: &[u8]) -> Result<IndexOutcome> {
        let document = Document::from_entry(key, value)?;
        self.index.index_document(&document.id, &document.body).await
    }

    // -------------------------------------------------------------------------
    // Statistics
    // -------------------------------------------------------------------------

    /// Get engine statistics.
    pub fn stats(&self) -> EngineStats {
        self.stats.read().clone()
    }
}

fn open_store(dir: Option<&Path>, file: &str) -> Result<Arc<dyn KvStore>> {
    match dir {
        Some(dir) => Ok(Arc::new(LogStore::open(dir.join(file))?)),
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

// =============================================================================
// Engine Statistics
// =============================================================================

/// Statistics for the document engine.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    pub documents_inserted: u64,
    pub index_failures: u64,
    pub index_searches: u64,
    pub full_scans: u64,
    pub reindex_runs: u64,
}

// =============================================================================
// Tests
// =============================================================================
