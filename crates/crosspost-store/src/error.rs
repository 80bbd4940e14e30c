//! Error types for store operations.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in durable-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object not found in the object store.
    #[error("object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    /// Post record not found.
    #[error("post not found: {0}")]
    PostNotFound(Uuid),

    /// Backend failure (connection, I/O, serialization).
    #[error("store backend error: {0}")]
    Backend(String),
}
