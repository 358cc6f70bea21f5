//! Quarry Server State
//!
//! Application state shared across request handlers: the loaded
//! configuration, the document engine and request counters.
//!
//! @version 0.1.0
//! @author Quarry Development Team

use quarry_common::{QuarryConfig, Result};
use quarry_document::DocumentEngine;
use std::sync::Arc;
use tokio::sync::RwLock;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<QuarryConfig>,
    pub engine: Arc<DocumentEngine>,
    pub metrics: Arc<RwLock<RequestMetrics>>,
}

impl AppState {
    /// Create state around an already opened engine.
    pub fn new(config: QuarryConfig, engine: DocumentEngine) -> Self {
        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            metrics: Arc::new(RwLock::new(RequestMetrics::default())),
        }
    }

    /// Open the stores named by `config` and build state around them.
    pub fn open(config: QuarryConfig) -> Result<Self> {
        let engine = DocumentEngine::open(&config)?;
        Ok(Self::new(config, engine))
    }

    /// State backed by in-memory stores.
    pub fn in_memory() -> Self {
        Self::new(QuarryConfig::in_memory(), DocumentEngine::in_memory())
    }

    /// Record a completed API request.
    pub async fn record_request(&self, duration_ms: u64, success: bool) {
        let mut metrics = self.metrics.write().await;
        metrics.total_requests += 1;
        metrics.total_duration_ms += duration_ms;
        if !success {
            metrics.failed_requests += 1;
        }
    }
}

// =============================================================================
// Request Metrics
// =============================================================================

/// Counters over document API requests.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct RequestMetrics {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub total_duration_ms: u64,
}

impl RequestMetrics {
    /// Calculate average request duration.
    pub fn avg_duration_ms(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.total_requests as f64
        }
    }

    /// Calculate success rate.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            1.0 - (self.failed_requests as f64 / self.total_requests as f64)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
