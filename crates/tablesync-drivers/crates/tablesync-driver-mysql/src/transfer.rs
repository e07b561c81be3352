//! MySQL table transfer primitives

use async_trait::async_trait;
use mysql_async::{Conn, prelude::*};
use tablesync_core::{
    Connection, Result, Row, RowBatcher, RowSink, TableStat, TableSyncError, TableTransfer,
};

use crate::MySqlConnection;
use crate::connection::{
    RowLayout, escape_identifier_mysql, escape_mysql_string, qualified_table_mysql,
    value_to_mysql_literal,
};

/// Build the statistics query for one database.
///
/// TABLE_ROWS is an InnoDB estimate; it is what the server exposes cheaply
/// and is good enough to tell an empty table from a populated one.
pub(crate) fn table_stats_sql(database: &str) -> String {
    format!(
        "SELECT TABLE_NAME, TABLE_ROWS, DATA_LENGTH, INDEX_LENGTH
         FROM information_schema.TABLES
         WHERE TABLE_SCHEMA = '{}' AND TABLE_TYPE = 'BASE TABLE'
         ORDER BY TABLE_NAME",
        escape_mysql_string(database)
    )
}

/// Build one multi-row INSERT statement
pub(crate) fn build_insert_statement(
    database: &str,
    table: &str,
    columns: &[String],
    rows: &[Row],
) -> String {
    let column_list = columns
        .iter()
        .map(|c| escape_identifier_mysql(c))
        .collect::<Vec<_>>()
        .join(", ");

    let values = rows
        .iter()
        .map(|row| {
            let literals = row
                .values
                .iter()
                .map(value_to_mysql_literal)
                .collect::<Vec<_>>()
                .join(", ");
            format!("({})", literals)
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualified_table_mysql(database, table),
        column_list,
        values
    )
}

/// Run `statements` on one session with foreign key checks disabled, so
/// tables can be created and filled independently of their references.
async fn run_without_fk_checks(conn: &mut Conn, statements: &[String]) -> Result<u64> {
    conn.query_drop("SET FOREIGN_KEY_CHECKS = 0")
        .await
        .map_err(|e| TableSyncError::Query(format!("Failed to disable foreign key checks: {}", e)))?;

    let mut affected = 0u64;
    let mut outcome = Ok(());
    for sql in statements {
        if let Err(e) = conn.query_drop(sql).await {
            outcome = Err(TableSyncError::Query(format!("Failed to execute statement: {}", e)));
            break;
        }
        affected += conn.affected_rows();
    }

    // Restored here for the normal path; the pool reset covers dropped futures
    if let Err(e) = conn.query_drop("SET FOREIGN_KEY_CHECKS = 1").await {
        tracing::warn!(error = %e, "failed to restore foreign key checks");
    }

    outcome.map(|_| affected)
}

#[async_trait]
impl TableTransfer for MySqlConnection {
    #[tracing::instrument(skip(self))]
    async fn list_table_stats(&self, database: &str) -> Result<Vec<TableStat>> {
        let result = self.query(&table_stats_sql(database), &[]).await?;

        let stats = result
            .rows
            .iter()
            .filter_map(|row| {
                let name = row.get(0).and_then(|v| v.as_str())?.to_string();
                let row_count = row.get(1).and_then(|v| v.as_u64()).unwrap_or(0);
                let data_length = row.get(2).and_then(|v| v.as_u64()).unwrap_or(0);
                let index_length = row.get(3).and_then(|v| v.as_u64()).unwrap_or(0);
                Some(TableStat::new(
                    name,
                    row_count,
                    data_length.saturating_add(index_length),
                ))
            })
            .collect::<Vec<_>>();

        tracing::debug!(database = %database, table_count = stats.len(), "table statistics loaded");
        Ok(stats)
    }

    #[tracing::instrument(skip(self))]
    async fn table_ddl(&self, database: &str, table: &str) -> Result<String> {
        let query = format!("SHOW CREATE TABLE {}", qualified_table_mysql(database, table));
        let result = self.query(&query, &[]).await?;

        result
            .rows
            .first()
            .and_then(|row| row.get(1))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                TableSyncError::Query(format!("Could not get DDL for table '{}'", table))
            })
    }

    #[tracing::instrument(skip(self, ddl))]
    async fn create_table(&self, database: &str, ddl: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;
        conn.query_drop(format!("USE {}", escape_identifier_mysql(database)))
            .await
            .map_err(|e| {
                TableSyncError::Query(format!("Failed to select database '{}': {}", database, e))
            })?;
        run_without_fk_checks(&mut conn, &[ddl.to_string()]).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, sink))]
    async fn stream_rows(
        &self,
        database: &str,
        table: &str,
        batch_size: usize,
        sink: &mut dyn RowSink,
    ) -> Result<u64> {
        let query = format!("SELECT * FROM {}", qualified_table_mysql(database, table));
        let mut conn = self.get_conn().await?;
        let mut result = conn
            .query_iter(query)
            .await
            .map_err(|e| TableSyncError::Query(format!("Failed to execute query: {}", e)))?;

        let mut batcher = RowBatcher::new(sink, batch_size);
        let mut layout: Option<RowLayout> = None;
        while let Some(mysql_row) = result
            .next()
            .await
            .map_err(|e| TableSyncError::Query(format!("Failed to read row: {}", e)))?
        {
            let current = layout.get_or_insert_with(|| RowLayout::of(&mysql_row));
            batcher.push(current.convert(mysql_row)).await?;
        }

        let rows = batcher.finish().await?;
        tracing::debug!(rows = rows, "rows streamed");
        Ok(rows)
    }

    #[tracing::instrument(skip(self, columns, rows), fields(row_count = rows.len()))]
    async fn write_rows(
        &self,
        database: &str,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let statement = build_insert_statement(database, table, columns, rows);
        let mut conn = self.get_conn().await?;
        run_without_fk_checks(&mut conn, &[statement]).await?;
        Ok(rows.len() as u64)
    }
}
