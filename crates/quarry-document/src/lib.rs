//! Quarry Document - Indexing and Query Engine
//!
//! Stores schemaless JSON documents and answers conjunctive queries over
//! dotted field paths. Every scalar leaf of a document is recorded in a
//! secondary index keyed by its literal `path=value` text; equality
//! predicates are answered from that index and everything else falls back
//! to scanning and matching documents directly.
//!
//! Key Features:
//! - Recursive JSON value model with dotted-path lookup
//! - Path flattening that skips arrays
//! - Lock-striped secondary index maintenance
//! - Compact query language: `a.b:12 name:"john doe" age:>18`
//! - Index-or-scan search coordination
//!
//! @version 0.1.0
//! @author Quarry Development Team

pub mod engine;
pub mod flatten;
pub mod index;
pub mod matcher;
pub mod query;
pub mod types;

pub use engine::{
    DocumentEngine, EngineConfig, EngineStats, ReindexReport, SearchOptions, SearchPlan,
    SearchResult,
};
pub use flatten::{path_values, PathValues};
pub use index::{index_key, IndexOutcome, SecondaryIndex};
pub use matcher::lookup_path;
pub use query::{Comparison, Operator, Query, QueryBuilder};
pub use types::{Document, DocumentId, Value};
