//! Execution options for the sync coordinator

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for one migration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Maximum number of tables copied concurrently
    pub max_workers: usize,
    /// Timeout per table attempt in milliseconds (0 = no timeout)
    pub table_timeout_ms: u64,
    /// Rows per multi-row INSERT statement
    pub insert_batch_size: usize,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker pool size (at least 1)
    pub fn with_max_workers(mut self, max: usize) -> Self {
        self.max_workers = max.max(1);
        self
    }

    /// Set the per-table timeout in milliseconds
    pub fn with_table_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.table_timeout_ms = timeout_ms;
        self
    }

    /// Set the INSERT batch size (at least 1)
    pub fn with_insert_batch_size(mut self, rows: usize) -> Self {
        self.insert_batch_size = rows.max(1);
        self
    }

    /// Clamp values that may have come from a hand-edited settings file
    pub fn normalized(self) -> Self {
        let (workers, batch) = (self.max_workers, self.insert_batch_size);
        self.with_max_workers(workers).with_insert_batch_size(batch)
    }

    pub(crate) fn table_timeout(&self) -> Option<Duration> {
        (self.table_timeout_ms > 0).then(|| Duration::from_millis(self.table_timeout_ms))
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_workers: 4,
            table_timeout_ms: 30 * 60 * 1000,
            insert_batch_size: 500,
        }
    }
}
