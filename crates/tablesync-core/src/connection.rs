//! Connection trait

use crate::{QueryResult, Result, StatementResult, TableTransfer, Value};
use async_trait::async_trait;

/// A database connection
///
/// Implementations may be backed by a pool; the engine issues independent
/// statements and never assumes two calls share one server session.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "mysql")
    fn driver_name(&self) -> &str;

    /// Execute a statement that does not return rows (DDL, INSERT, SET ...)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT, SHOW ...)
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;

    /// Get the table transfer interface if supported
    fn as_table_transfer(&self) -> Option<&dyn TableTransfer> {
        None
    }
}
