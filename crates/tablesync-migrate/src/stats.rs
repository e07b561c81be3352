//! Table statistics collection

use std::sync::Arc;
use tablesync_core::TableStat;

use crate::{ConnectionExecutor, MigrationError, Result};

/// Lists tables with row count and size through a [`ConnectionExecutor`].
///
/// Statistics are fetched fresh on every call; row counts may be live
/// estimates, so nothing is cached between runs.
pub struct TableStatsCollector<E> {
    executor: Arc<E>,
}

impl<E> Clone for TableStatsCollector<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
        }
    }
}

impl<E: ConnectionExecutor> TableStatsCollector<E> {
    pub fn new(executor: Arc<E>) -> Self {
        Self { executor }
    }

    pub(crate) fn executor(&self) -> &E {
        &self.executor
    }

    /// List the tables of `database` on connection `connection_id`.
    ///
    /// Resolution failures are `Connection` errors; a failing statistics
    /// query is a `Query` error unless the session itself dropped.
    #[tracing::instrument(skip(self))]
    pub async fn list_table_stats(
        &self,
        connection_id: &str,
        database: &str,
    ) -> Result<Vec<TableStat>> {
        if connection_id.trim().is_empty() || database.trim().is_empty() {
            return Err(MigrationError::InvalidRequest(
                "connection and database must not be empty".into(),
            ));
        }

        let handle = self
            .executor
            .resolve_connection(connection_id)
            .await
            .map_err(|e| MigrationError::Connection {
                connection_id: connection_id.to_string(),
                message: e.to_string(),
            })?;

        let stats = self
            .executor
            .list_table_stats(&handle, database)
            .await
            .map_err(|e| MigrationError::from_collaborator(connection_id, e))?;

        tracing::debug!(table_count = stats.len(), "table statistics collected");
        Ok(stats)
    }
}
