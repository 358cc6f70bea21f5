//! Quarry Config - Configuration Structures
//!
//! Configuration types for the storage layer, the secondary index, the
//! document engine and the HTTP front end. Every section has defaults, so a
//! TOML file only needs to name the settings it changes.
//!
//! @version 0.1.0
//! @author Quarry Development Team

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =============================================================================
// Storage Configuration
// =============================================================================

/// Configuration for the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the document and index logs. `None` keeps
    /// everything in memory.
    pub data_directory: Option<PathBuf>,
    /// Fsync document writes before acknowledging them.
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: None,
            sync_writes: true,
        }
    }
}

// =============================================================================
// Index Configuration
// =============================================================================

/// Configuration for secondary index maintenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Number of mutex stripes guarding index entry updates.
    pub lock_stripes: usize,
    /// Rebuild index entries for every stored document at start-up.
    pub reindex_on_startup: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            lock_stripes: 64,
            reindex_on_startup: true,
        }
    }
}

// =============================================================================
// Engine Limits
// =============================================================================

/// Limits enforced by the document engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineLimits {
    pub max_document_size: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_document_size: 16 * 1024 * 1024, // 16MB
        }
    }
}

// =============================================================================
// Network Configuration
// =============================================================================

/// Configuration for the HTTP front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            body_limit_bytes: 16 * 1024 * 1024,
        }
    }
}

impl NetworkConfig {
    /// Host and port joined for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Top-level Configuration
// =============================================================================

/// Top-level Quarry configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarryConfig {
    pub storage: StorageConfig,
    pub index: IndexConfig,
    pub limits: EngineLimits,
    pub network: NetworkConfig,
}

impl QuarryConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::QuarryError::Configuration(e.to_string()))
    }

    /// Configuration with in-memory stores, used by tests and ephemeral runs.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Set the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage.data_directory = Some(dir.into());
        self
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QuarryConfig::default();
        assert!(config.storage.data_directory.is_none());
        assert!(config.storage.sync_writes);
        assert_eq!(config.index.lock_stripes, 64);
        assert!(config.index.reindex_on_startup);
        assert_eq!(config.network.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_partial_toml() {
        let config = QuarryConfig::from_toml_str(
            r#"
            [storage]
            data_directory = "/var/lib/quarry"

            [index]
            reindex_on_startup = false

            [network]
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(
            config.storage.data_directory,
            Some(PathBuf::from("/var/lib/quarry"))
        );
        assert!(config.storage.sync_writes);
        assert!(!config.index.reindex_on_startup);
        assert_eq!(config.index.lock_stripes, 64);
        assert_eq!(config.network.port, 9000);
        assert_eq!(config.network.host, "127.0.0.1");
    }

    #[test]
    fn test_invalid_toml() {
        let result = QuarryConfig::from_toml_str("[index]\nlock_stripes = \"many\"");
        assert!(matches!(result, Err(crate::QuarryError::Configuration(_))));
    }
}
