//! The collaborator boundary the engine drives
//!
//! The engine never talks to a database directly. Everything it needs goes
//! through a [`ConnectionExecutor`]: resolve a connection id to a handle,
//! list table statistics, and copy one table's schema or rows.

use async_trait::async_trait;
use std::sync::Arc;
use tablesync_connection::ConnectionManager;
use tablesync_core::{
    Connection, Result, Row, RowSink, TableStat, TableSyncError, TableTransfer,
};

/// Connection-execution capability consumed by the engine
#[async_trait]
pub trait ConnectionExecutor: Send + Sync + 'static {
    /// Resolved connection, cheap to clone and share between table workers
    type Handle: Clone + Send + Sync + 'static;

    /// Resolve a connection id to a live handle
    async fn resolve_connection(&self, id: &str) -> Result<Self::Handle>;

    /// Whether two connection ids name the same connection profile.
    /// Used to reject migrating a database onto itself.
    fn same_connection(&self, a: &str, b: &str) -> bool {
        a == b
    }

    /// List base tables of `database` with row count and size.
    /// A database without tables yields an empty list.
    async fn list_table_stats(&self, handle: &Self::Handle, database: &str)
    -> Result<Vec<TableStat>>;

    /// Create `table` on the target with the source table's structure
    async fn copy_schema(
        &self,
        source: &Self::Handle,
        source_db: &str,
        target: &Self::Handle,
        target_db: &str,
        table: &str,
    ) -> Result<()>;

    /// Copy every row of `table` from source to target, returning the row count
    async fn copy_data(
        &self,
        source: &Self::Handle,
        source_db: &str,
        target: &Self::Handle,
        target_db: &str,
        table: &str,
    ) -> Result<u64>;
}

/// Executor backed by saved connection profiles and their drivers
pub struct DriverExecutor {
    connections: Arc<ConnectionManager>,
    insert_batch_size: usize,
}

impl DriverExecutor {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self {
            connections,
            insert_batch_size: crate::SyncOptions::default().insert_batch_size,
        }
    }

    /// Rows per INSERT statement written to the target
    pub fn with_insert_batch_size(mut self, rows: usize) -> Self {
        self.insert_batch_size = rows.max(1);
        self
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }
}

fn transfer(handle: &Arc<dyn Connection>) -> Result<&dyn TableTransfer> {
    handle.as_table_transfer().ok_or_else(|| {
        TableSyncError::NotSupported(format!(
            "driver '{}' does not support table transfer",
            handle.driver_name()
        ))
    })
}

#[async_trait]
impl ConnectionExecutor for DriverExecutor {
    type Handle = Arc<dyn Connection>;

    /// Ids are saved-profile UUIDs or profile names
    async fn resolve_connection(&self, id: &str) -> Result<Self::Handle> {
        let saved = self
            .connections
            .find_saved(id)
            .ok_or_else(|| TableSyncError::NotFound(format!("No saved connection '{}'", id)))?;
        self.connections.resolve(saved.id).await
    }

    /// A profile name and its UUID are the same connection
    fn same_connection(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        match (self.connections.find_saved(a), self.connections.find_saved(b)) {
            (Some(a), Some(b)) => a.id == b.id,
            _ => false,
        }
    }

    async fn list_table_stats(
        &self,
        handle: &Self::Handle,
        database: &str,
    ) -> Result<Vec<TableStat>> {
        transfer(handle)?.list_table_stats(database).await
    }

    #[tracing::instrument(skip(self, source, target))]
    async fn copy_schema(
        &self,
        source: &Self::Handle,
        source_db: &str,
        target: &Self::Handle,
        target_db: &str,
        table: &str,
    ) -> Result<()> {
        let ddl = transfer(source)?.table_ddl(source_db, table).await?;
        transfer(target)?.create_table(target_db, &ddl).await
    }

    #[tracing::instrument(skip(self, source, target))]
    async fn copy_data(
        &self,
        source: &Self::Handle,
        source_db: &str,
        target: &Self::Handle,
        target_db: &str,
        table: &str,
    ) -> Result<u64> {
        let mut sink = TargetSink {
            target: transfer(target)?,
            database: target_db,
            table,
            written: 0,
        };
        let read = transfer(source)?
            .stream_rows(source_db, table, self.insert_batch_size, &mut sink)
            .await?;
        tracing::debug!(read = read, written = sink.written, "rows copied");
        Ok(sink.written)
    }
}

/// Writes each streamed batch to the target table as it arrives
struct TargetSink<'a> {
    target: &'a dyn TableTransfer,
    database: &'a str,
    table: &'a str,
    written: u64,
}

#[async_trait]
impl RowSink for TargetSink<'_> {
    async fn write_batch(&mut self, columns: &[String], rows: Vec<Row>) -> Result<()> {
        self.written += self
            .target
            .write_rows(self.database, self.table, columns, &rows)
            .await?;
        Ok(())
    }
}
