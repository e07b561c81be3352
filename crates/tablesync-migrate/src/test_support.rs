//! In-memory collaborator used by the engine tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tablesync_core::{Result, TableStat, TableSyncError};

use crate::ConnectionExecutor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpyCall {
    Resolve(String),
    ListStats { conn: String, db: String },
    CopySchema(String),
    CopyData(String),
}

impl SpyCall {
    pub fn is_copy(&self) -> bool {
        matches!(self, SpyCall::CopySchema(_) | SpyCall::CopyData(_))
    }
}

type DbKey = (String, String);

/// Records every call and behaves like a pair of tiny databases: copying a
/// table's schema creates it on the target, copying data sets its row count.
#[derive(Default)]
pub struct SpyExecutor {
    tables: Mutex<HashMap<DbKey, Vec<TableStat>>>,
    unreachable: Mutex<HashSet<String>>,
    failing_stats: Mutex<HashSet<DbKey>>,
    failing_schema: Mutex<HashSet<String>>,
    failing_data: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<SpyCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SpyExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(self, conn: &str, db: &str, tables: &[(&str, u64)]) -> Self {
        self.set_tables(conn, db, tables);
        self
    }

    /// Replace the catalog of `db` on `conn`
    pub fn set_tables(&self, conn: &str, db: &str, tables: &[(&str, u64)]) {
        let stats = tables
            .iter()
            .map(|(name, rows)| TableStat::new(*name, *rows, rows * 64))
            .collect();
        self.tables
            .lock()
            .insert((conn.to_string(), db.to_string()), stats);
    }

    pub fn unreachable(self, conn: &str) -> Self {
        self.unreachable.lock().insert(conn.to_string());
        self
    }

    pub fn failing_stats(self, conn: &str, db: &str) -> Self {
        self.failing_stats
            .lock()
            .insert((conn.to_string(), db.to_string()));
        self
    }

    pub fn failing_schema(self, table: &str) -> Self {
        self.failing_schema.lock().insert(table.to_string());
        self
    }

    pub fn failing_data(self, table: &str) -> Self {
        self.failing_data.lock().insert(table.to_string());
        self
    }

    /// Make every copy of `table` take `delay`
    pub fn delayed(self, table: &str, delay: Duration) -> Self {
        self.delays.lock().insert(table.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<SpyCall> {
        self.calls.lock().clone()
    }

    pub fn copy_calls(&self) -> Vec<SpyCall> {
        self.calls().into_iter().filter(SpyCall::is_copy).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn table(&self, conn: &str, db: &str, table: &str) -> Option<TableStat> {
        self.tables
            .lock()
            .get(&(conn.to_string(), db.to_string()))
            .and_then(|stats| stats.iter().find(|s| s.name == table).cloned())
    }

    fn record(&self, call: SpyCall) {
        self.calls.lock().push(call);
    }

    async fn simulate_work(&self, table: &str) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = self.delays.lock().get(table).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn upsert_target(&self, conn: &str, db: &str, table: &str, rows: Option<u64>) {
        let mut tables = self.tables.lock();
        let stats = tables
            .entry((conn.to_string(), db.to_string()))
            .or_default();
        match stats.iter_mut().find(|s| s.name == table) {
            Some(stat) => {
                if let Some(rows) = rows {
                    stat.row_count += rows;
                }
            }
            None => stats.push(TableStat::new(table, rows.unwrap_or(0), 0)),
        }
    }
}

#[async_trait]
impl ConnectionExecutor for SpyExecutor {
    type Handle = String;

    async fn resolve_connection(&self, id: &str) -> Result<String> {
        self.record(SpyCall::Resolve(id.to_string()));
        if self.unreachable.lock().contains(id) {
            return Err(TableSyncError::Connection(format!("{} is unreachable", id)));
        }
        Ok(id.to_string())
    }

    async fn list_table_stats(&self, handle: &String, database: &str) -> Result<Vec<TableStat>> {
        self.record(SpyCall::ListStats {
            conn: handle.clone(),
            db: database.to_string(),
        });
        let key = (handle.clone(), database.to_string());
        if self.failing_stats.lock().contains(&key) {
            return Err(TableSyncError::Query("statistics query failed".into()));
        }
        Ok(self.tables.lock().get(&key).cloned().unwrap_or_default())
    }

    async fn copy_schema(
        &self,
        _source: &String,
        _source_db: &str,
        target: &String,
        target_db: &str,
        table: &str,
    ) -> Result<()> {
        self.record(SpyCall::CopySchema(table.to_string()));
        self.simulate_work(table).await;
        if self.failing_schema.lock().contains(table) {
            return Err(TableSyncError::Query(format!("cannot create {}", table)));
        }
        self.upsert_target(target, target_db, table, None);
        Ok(())
    }

    async fn copy_data(
        &self,
        source: &String,
        source_db: &str,
        target: &String,
        target_db: &str,
        table: &str,
    ) -> Result<u64> {
        self.record(SpyCall::CopyData(table.to_string()));
        self.simulate_work(table).await;
        if self.failing_data.lock().contains(table) {
            return Err(TableSyncError::Query(format!("insert into {} failed", table)));
        }
        let rows = self
            .table(source, source_db, table)
            .map_or(0, |s| s.row_count);
        self.upsert_target(target, target_db, table, Some(rows));
        Ok(rows)
    }
}
