//! Quarry Common - Shared Types and Utilities
//!
//! Foundational error handling, configuration, and hashing helpers used by
//! the storage, document, and server crates. Keeps error classification and
//! tuning knobs consistent across every layer.
//!
//! Key Features:
//! - Unified error type covering parse, lookup, storage and decode failures
//! - Configuration structures loadable from TOML
//! - Hashing and checksum helpers for lock striping and log integrity
//!
//! @version 0.1.0
//! @author Quarry Development Team

pub mod config;
pub mod error;
pub mod utils;

pub use config::{EngineLimits, IndexConfig, NetworkConfig, QuarryConfig, StorageConfig};
pub use error::{QuarryError, Result};
