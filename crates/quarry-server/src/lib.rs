//! Quarry Server - HTTP Front End
//!
//! Thin REST layer over the document engine. Accepts JSON documents, serves
//! them back by ID and answers queries written in the Quarry query language.
//!
//! Key Features:
//! - `POST /docs`, `GET /docs/:id`, `GET /docs?q=...`
//! - Uniform `{"status": ..., "body" | "error": ...}` response envelope
//! - Request IDs and request tracing on every call
//!
//! @version 0.1.0
//! @author Quarry Development Team

pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use handlers::{ApiError, ApiResponse};
pub use router::create_router;
pub use state::{AppState, RequestMetrics};
