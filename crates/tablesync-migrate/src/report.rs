//! Aggregated results of a migration run

use serde::Serialize;

use crate::TableSyncOutcome;

/// Summary over a run's outcomes. Counts do not depend on outcome order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub outcomes: Vec<TableSyncOutcome>,
    pub succeeded_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub rows_copied: u64,
}

impl SyncReport {
    pub fn new(outcomes: Vec<TableSyncOutcome>) -> Self {
        let succeeded_count = outcomes.iter().filter(|o| o.is_succeeded()).count();
        let failed_count = outcomes.iter().filter(|o| o.is_failed()).count();
        let skipped_count = outcomes.iter().filter(|o| o.is_skipped()).count();
        let rows_copied = outcomes.iter().map(|o| o.rows_copied).sum();

        Self {
            outcomes,
            succeeded_count,
            failed_count,
            skipped_count,
            rows_copied,
        }
    }

    /// Check if every table was copied
    pub fn all_succeeded(&self) -> bool {
        self.failed_count == 0 && self.skipped_count == 0
    }

    /// Check if any table failed
    pub fn has_failures(&self) -> bool {
        self.failed_count > 0
    }

    /// Get all failed outcomes
    pub fn failed(&self) -> Vec<&TableSyncOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed()).collect()
    }

    pub fn outcome(&self, table: &str) -> Option<&TableSyncOutcome> {
        self.outcomes.iter().find(|o| o.name == table)
    }

    pub fn table_count(&self) -> usize {
        self.outcomes.len()
    }
}
