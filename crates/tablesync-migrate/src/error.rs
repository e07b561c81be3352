//! Error types for the migration engine

use tablesync_core::TableSyncError;
use thiserror::Error;

use crate::RunVerdict;

/// Request-level failures. Failures of a single table during execution are
/// never reported here; they end up in that table's outcome.
#[derive(Error, Debug, Clone)]
pub enum MigrationError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Connection '{connection_id}' unavailable: {message}")]
    Connection {
        connection_id: String,
        message: String,
    },

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration blocked: {} table(s) conflict with the target", .0.blocking_tables().len())]
    Blocked(RunVerdict),

    #[error("Cannot {operation} while the run is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },
}

impl MigrationError {
    /// Classify a collaborator error raised while talking to `connection_id`
    pub fn from_collaborator(connection_id: &str, error: TableSyncError) -> Self {
        if error.is_connection_failure() {
            MigrationError::Connection {
                connection_id: connection_id.to_string(),
                message: error.to_string(),
            }
        } else {
            MigrationError::Query(error.to_string())
        }
    }

    /// The verdict carried by a blocked error
    pub fn verdict(&self) -> Option<&RunVerdict> {
        match self {
            MigrationError::Blocked(verdict) => Some(verdict),
            _ => None,
        }
    }
}

/// Result type alias for migration operations
pub type Result<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_error_classes() {
        let err = MigrationError::from_collaborator(
            "prod",
            TableSyncError::Connection("refused".into()),
        );
        assert!(matches!(
            err,
            MigrationError::Connection { ref connection_id, .. } if connection_id == "prod"
        ));

        let err = MigrationError::from_collaborator("prod", TableSyncError::NotFound("x".into()));
        assert!(matches!(err, MigrationError::Connection { .. }));

        let err =
            MigrationError::from_collaborator("prod", TableSyncError::Query("bad sql".into()));
        assert!(matches!(err, MigrationError::Query(ref m) if m.contains("bad sql")));
    }
}
