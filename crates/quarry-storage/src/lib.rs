//! Quarry Storage - Ordered Key-Value Stores
//!
//! The persistence collaborator behind the document engine. Offers point
//! reads, writes with an optional durability barrier, and ordered snapshot
//! scans over byte keys and values.
//!
//! Key Features:
//! - Pluggable `KvStore` trait shared by all backends
//! - In-memory backend for tests and ephemeral deployments
//! - Append-only log backend with checksummed records and crash recovery
//!
//! @version 0.1.0
//! @author Quarry Development Team

pub mod backend;
pub mod log;

pub use backend::{KvStore, MemoryStore, StoreStats};
pub use log::LogStore;
