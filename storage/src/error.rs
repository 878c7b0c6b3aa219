//! Storage errors

use thiserror::Error;

/// Storage result type
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Journal entry does not extend the journal by exactly one
    #[error("Non-contiguous journal append: expected sequence {expected}, got {got}")]
    NonContiguous { expected: u64, got: u64 },

    /// Snapshot does not match the journal entry it is stored with
    #[error("Snapshot at sequence {snapshot} does not match journal entry {entry}")]
    SnapshotMismatch { snapshot: u64, entry: u64 },

    /// State not found
    #[error("State not found at sequence {0}")]
    StateNotFound(u64),

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Corruption detected
    #[error("Data corruption detected: {0}")]
    Corruption(String),
}

impl From<bincode::Error> for StorageError {
    fn from(e: bincode::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
