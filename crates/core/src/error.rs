//! Error types for the Storyloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Storyloom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Tree store errors ---
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    // --- Content blob errors ---
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    // --- Lock errors ---
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Tree validation failed: {0}")]
    Validation(String),

    #[error("Document store is corrupt and unrecoverable: {0}")]
    Corruption(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Content rejected by safety screen: {reason}")]
    SafetyRejected { reason: String },

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Timed out acquiring lock on '{path}' after {waited_ms}ms (owner: {owner})")]
    Timeout {
        path: String,
        owner: String,
        waited_ms: u64,
    },
}
