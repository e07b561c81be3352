//! Conflict classification and run verdicts

use serde::{Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use tablesync_core::TableStat;

use crate::{
    ConnectionExecutor, MigrationError, MigrationMode, MigrationRequest, Result,
    TableStatsCollector,
};

/// Why a table was flagged during precheck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckReason {
    /// Informational: the table will be created or filled from scratch
    TargetAbsent,
    /// The target already has a table with this name (schema-affecting modes)
    TargetTableExists,
    /// The target table already holds rows (data-affecting modes)
    TargetHasRows,
}

impl CheckReason {
    pub fn is_blocking(self) -> bool {
        !matches!(self, CheckReason::TargetAbsent)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CheckReason::TargetAbsent => "target table absent",
            CheckReason::TargetTableExists => "target already has a table of this name",
            CheckReason::TargetHasRows => "target table already has rows",
        }
    }
}

impl std::fmt::Display for CheckReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CheckReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Classification of one table in the working set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCheckResult {
    pub name: String,
    pub source_rows: u64,
    /// Row count on the target, 0 when the table is absent there
    pub target_rows: u64,
    pub blocking: bool,
    /// Reasons in the order they were found
    pub reasons: Vec<CheckReason>,
}

impl TableCheckResult {
    pub fn target_exists(&self) -> bool {
        !self.reasons.contains(&CheckReason::TargetAbsent)
    }

    /// Reasons rendered for display, joined with "; "
    pub fn reason_text(&self) -> String {
        self.reasons
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Outcome of a precheck: one check per working-set table, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunVerdict {
    pub checks: Vec<TableCheckResult>,
    /// True iff at least one check is blocking
    pub blocked: bool,
}

impl RunVerdict {
    pub fn new(checks: Vec<TableCheckResult>) -> Self {
        let blocked = checks.iter().any(|c| c.blocking);
        Self { checks, blocked }
    }

    pub fn is_clear(&self) -> bool {
        !self.blocked
    }

    pub fn blocking_tables(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| c.blocking)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.checks.iter().map(|c| c.name.clone()).collect()
    }

    pub fn check(&self, table: &str) -> Option<&TableCheckResult> {
        self.checks.iter().find(|c| c.name == table)
    }

    /// Drop the checks for `tables`, keeping the order of the rest
    pub(crate) fn without(mut self, tables: &BTreeSet<String>) -> Self {
        self.checks.retain(|c| !tables.contains(&c.name));
        Self::new(self.checks)
    }
}

/// Classify one source table against its target counterpart.
pub fn classify(
    source: &TableStat,
    target: Option<&TableStat>,
    mode: MigrationMode,
) -> TableCheckResult {
    let mut reasons = Vec::new();
    match target {
        None => reasons.push(CheckReason::TargetAbsent),
        Some(target) => {
            if mode.copies_schema() {
                reasons.push(CheckReason::TargetTableExists);
            }
            if mode.copies_data() && target.row_count > 0 {
                reasons.push(CheckReason::TargetHasRows);
            }
        }
    }

    TableCheckResult {
        name: source.name.clone(),
        source_rows: source.row_count,
        target_rows: target.map_or(0, |t| t.row_count),
        blocking: reasons.iter().any(|r| r.is_blocking()),
        reasons,
    }
}

/// Tables a request covers, in source listing order.
///
/// Selected tables missing from the source are a request error, never
/// silently dropped.
pub(crate) fn working_set<'a>(
    source_stats: &'a [TableStat],
    selected: &BTreeSet<String>,
) -> Result<Vec<&'a TableStat>> {
    if selected.is_empty() {
        return Ok(source_stats.iter().collect());
    }

    let present: BTreeSet<&str> = source_stats.iter().map(|s| s.name.as_str()).collect();
    let missing: Vec<&str> = selected
        .iter()
        .map(String::as_str)
        .filter(|t| !present.contains(t))
        .collect();
    if !missing.is_empty() {
        return Err(MigrationError::InvalidRequest(format!(
            "selected tables not found in source database: {}",
            missing.join(", ")
        )));
    }

    Ok(source_stats
        .iter()
        .filter(|s| selected.contains(&s.name))
        .collect())
}

/// Classify a request against already collected statistics. Pure.
pub(crate) fn evaluate(
    request: &MigrationRequest,
    source_stats: &[TableStat],
    target_stats: &[TableStat],
) -> Result<RunVerdict> {
    let targets: HashMap<&str, &TableStat> = target_stats
        .iter()
        .map(|t| (t.name.as_str(), t))
        .collect();

    let checks = working_set(source_stats, &request.selected_tables)?
        .into_iter()
        .map(|source| classify(source, targets.get(source.name.as_str()).copied(), request.mode))
        .collect();

    Ok(RunVerdict::new(checks))
}

/// Runs prechecks: fresh statistics on both sides, then classification.
pub struct ConflictDetector<E> {
    collector: TableStatsCollector<E>,
}

impl<E> Clone for ConflictDetector<E> {
    fn clone(&self) -> Self {
        Self {
            collector: self.collector.clone(),
        }
    }
}

impl<E: ConnectionExecutor> ConflictDetector<E> {
    pub fn new(collector: TableStatsCollector<E>) -> Self {
        Self { collector }
    }

    /// Read-only and idempotent: unchanged statistics give an identical verdict.
    #[tracing::instrument(skip(self, request), fields(
        source = %request.source_conn,
        source_db = %request.source_db,
        target = %request.target_conn,
        target_db = %request.target_db,
        mode = %request.mode,
    ))]
    pub async fn precheck(&self, request: &MigrationRequest) -> Result<RunVerdict> {
        let executor = self.collector.executor();
        request.validate_with(|a, b| executor.same_connection(a, b))?;

        let (source_stats, target_stats) = tokio::try_join!(
            self.collector
                .list_table_stats(&request.source_conn, &request.source_db),
            self.collector
                .list_table_stats(&request.target_conn, &request.target_db),
        )?;

        let verdict = evaluate(request, &source_stats, &target_stats)?;
        if verdict.blocked {
            tracing::warn!(
                tables = verdict.checks.len(),
                blocking = ?verdict.blocking_tables(),
                "precheck blocked"
            );
        } else {
            tracing::info!(tables = verdict.checks.len(), "precheck clear");
        }
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests;
