//! Error types for TableSync

use thiserror::Error;

/// Core error type for TableSync operations
#[derive(Error, Debug)]
pub enum TableSyncError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl TableSyncError {
    /// Whether the error means a connection could not be resolved or opened,
    /// as opposed to a statement failing on an open connection.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            TableSyncError::Connection(_) | TableSyncError::NotFound(_) | TableSyncError::Driver(_)
        )
    }
}

/// Result type alias for TableSync operations
pub type Result<T> = std::result::Result<T, TableSyncError>;
