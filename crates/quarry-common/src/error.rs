//! Quarry Error - Unified Error Types
//!
//! Every fallible operation in Quarry reports one of these variants. Errors
//! fall into four families: malformed queries, missing documents, storage
//! failures, and undecodable documents. The server uses the classification
//! helpers below to pick a response status.
//!
//! @version 0.1.0
//! @author Quarry Development Team

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Unified error type for all Quarry operations.
#[derive(Error, Debug)]
pub enum QuarryError {
    // Query errors
    #[error("parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    // Lookup errors
    #[error("document not found: {0}")]
    NotFound(String),

    // Storage errors
    #[error("storage error: {0}")]
    Storage(String),

    #[error("corruption detected: {0}")]
    Corruption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Document errors
    #[error("decode error: {0}")]
    Decode(String),

    #[error("document of {size} bytes exceeds the {limit} byte limit")]
    DocumentTooLarge { size: usize, limit: usize },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<serde_json::Error> for QuarryError {
    fn from(err: serde_json::Error) -> Self {
        QuarryError::Decode(err.to_string())
    }
}

// =============================================================================
// Type Aliases
// =============================================================================

/// Result type alias for Quarry operations.
pub type Result<T> = std::result::Result<T, QuarryError>;

// =============================================================================
// Error Classification
// =============================================================================

impl QuarryError {
    /// Build a parse error at the given character offset.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        QuarryError::Parse {
            position,
            message: message.into(),
        }
    }

    /// Returns true if the caller supplied bad input (vs a system failure).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            QuarryError::Parse { .. }
                | QuarryError::Decode(_)
                | QuarryError::NotFound(_)
                | QuarryError::DocumentTooLarge { .. }
        )
    }

    /// Returns true if the persistence layer failed.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            QuarryError::Storage(_) | QuarryError::Corruption(_) | QuarryError::Io(_)
        )
    }

    /// Character offset of a parse failure, if this is one.
    pub fn position(&self) -> Option<usize> {
        match self {
            QuarryError::Parse { position, .. } => Some(*position),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
