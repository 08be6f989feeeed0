//! Error types for the posterity-store crate.
//!
//! Every store operation returns [`StoreError`], which separates I/O and
//! encoding problems from the logical failures a caller can act on (missing
//! records, duplicates, writes to a letter that was already delivered).

use std::io;

use thiserror::Error;

use crate::types::{LetterId, RecipientId};

/// Top-level store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O operation failed (file read/write/rename).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// No letter with this id.
    #[error("Letter not found: {0}")]
    LetterNotFound(LetterId),

    /// No recipient with this id.
    #[error("Recipient not found: {0}")]
    RecipientNotFound(RecipientId),

    /// A record with this id already exists.
    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    /// The letter is in its terminal `sent` state and may not be modified.
    #[error("Letter already delivered: {0}")]
    AlreadyDelivered(LetterId),

    /// A persisted letter whose `is_delivered` flag disagrees with its state.
    #[error("Inconsistent delivery state for letter {0}: is_delivered disagrees with state")]
    InconsistentDelivery(LetterId),

    /// Store location validation failed.
    #[error("Store validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Internal error (lock poisoning, capacity, injected faults, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Serialization and deserialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// Bincode serialization failed.
    #[error("Bincode encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// Bincode deserialization failed.
    #[error("Bincode decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

/// Store directory validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Path contains a `..` component.
    #[error("Store path cannot contain '..' components: {0}")]
    ParentComponent(String),

    /// Path is relative.
    #[error("Store path must be absolute: {0}")]
    NotAbsolute(String),

    /// Path lies inside a protected system directory.
    #[error("Store path cannot be in system directory {prefix}: {path}")]
    SystemDirectory { prefix: String, path: String },

    /// Path exists but is not a directory.
    #[error("Store path is not a directory: {0}")]
    NotDirectory(String),
}

/// Specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}

impl From<bincode::error::EncodeError> for StoreError {
    fn from(e: bincode::error::EncodeError) -> Self {
        Self::Serialization(e.into())
    }
}

impl From<bincode::error::DecodeError> for StoreError {
    fn from(e: bincode::error::DecodeError) -> Self {
        Self::Serialization(e.into())
    }
}
