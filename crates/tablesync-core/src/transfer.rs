//! Per-table migration primitives

use crate::{Result, Row, TableStat};
use async_trait::async_trait;

/// Receives rows from [`TableTransfer::stream_rows`] one batch at a time
#[async_trait]
pub trait RowSink: Send {
    /// Write one batch. `columns` is the same for every batch of a table.
    async fn write_batch(&mut self, columns: &[String], rows: Vec<Row>) -> Result<()>;
}

/// Groups rows into [`RowSink`] batches of a fixed size.
///
/// The column list is taken from the first row pushed.
pub struct RowBatcher<'a> {
    sink: &'a mut dyn RowSink,
    columns: Vec<String>,
    batch: Vec<Row>,
    batch_size: usize,
    total: u64,
}

impl<'a> RowBatcher<'a> {
    pub fn new(sink: &'a mut dyn RowSink, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            columns: Vec::new(),
            batch: Vec::with_capacity(batch_size),
            batch_size,
            total: 0,
        }
    }

    /// Buffer one row, writing the batch once it is full
    pub async fn push(&mut self, row: Row) -> Result<()> {
        if self.columns.is_empty() {
            self.columns = row.columns().to_vec();
        }
        self.batch.push(row);
        if self.batch.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let rows = std::mem::replace(&mut self.batch, Vec::with_capacity(self.batch_size));
        let count = rows.len() as u64;
        self.sink.write_batch(&self.columns, rows).await?;
        self.total += count;
        Ok(())
    }

    /// Write the last partial batch and return the number of rows written
    pub async fn finish(mut self) -> Result<u64> {
        self.flush().await?;
        Ok(self.total)
    }
}

/// Driver-level primitives a table migration is built from.
///
/// Every method names its database explicitly so a single connection can
/// serve several databases on the same server.
#[async_trait]
pub trait TableTransfer: Send + Sync {
    /// List base tables of `database` with row count and size.
    ///
    /// A database without tables yields an empty list. The order is stable
    /// for a given catalog state.
    async fn list_table_stats(&self, database: &str) -> Result<Vec<TableStat>>;

    /// Produce the statement that recreates `table`'s structure
    async fn table_ddl(&self, database: &str, table: &str) -> Result<String>;

    /// Run a create statement produced by [`TableTransfer::table_ddl`]
    /// (possibly by another connection) inside `database`.
    async fn create_table(&self, database: &str, ddl: &str) -> Result<()>;

    /// Read every row of `table`, handing them to `sink` in batches of at
    /// most `batch_size` rows as they arrive. At most one batch is held in
    /// memory. Returns the number of rows read.
    async fn stream_rows(
        &self,
        database: &str,
        table: &str,
        batch_size: usize,
        sink: &mut dyn RowSink,
    ) -> Result<u64>;

    /// Append `rows` to `table` in a single statement.
    /// Returns the number of rows written.
    async fn write_rows(
        &self,
        database: &str,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TableSyncError, Value};

    #[derive(Default)]
    struct RecordingSink {
        batches: Vec<(Vec<String>, usize)>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl RowSink for RecordingSink {
        async fn write_batch(&mut self, columns: &[String], rows: Vec<Row>) -> Result<()> {
            if self.fail_on == Some(self.batches.len()) {
                return Err(TableSyncError::Query("disk full".into()));
            }
            self.batches.push((columns.to_vec(), rows.len()));
            Ok(())
        }
    }

    fn row(id: i64) -> Row {
        Row::new(vec!["id".into()], vec![Value::Int64(id)])
    }

    #[tokio::test]
    async fn test_rows_are_flushed_per_batch() {
        let mut sink = RecordingSink::default();
        let mut batcher = RowBatcher::new(&mut sink, 2);
        for id in 0..5 {
            batcher.push(row(id)).await.unwrap();
        }
        assert_eq!(batcher.finish().await.unwrap(), 5);

        let sizes: Vec<usize> = sink.batches.iter().map(|(_, n)| *n).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(sink.batches.iter().all(|(cols, _)| cols == &["id".to_string()]));
    }

    #[tokio::test]
    async fn test_empty_table_writes_nothing() {
        let mut sink = RecordingSink::default();
        let batcher = RowBatcher::new(&mut sink, 500);
        assert_eq!(batcher.finish().await.unwrap(), 0);
        assert!(sink.batches.is_empty());
    }

    #[tokio::test]
    async fn test_sink_error_stops_the_copy() {
        let mut sink = RecordingSink {
            fail_on: Some(1),
            ..Default::default()
        };
        let mut batcher = RowBatcher::new(&mut sink, 2);
        batcher.push(row(1)).await.unwrap();
        batcher.push(row(2)).await.unwrap();
        batcher.push(row(3)).await.unwrap();
        let err = batcher.push(row(4)).await.unwrap_err();

        assert!(matches!(err, TableSyncError::Query(_)));
        assert_eq!(sink.batches.len(), 1);
    }
}
