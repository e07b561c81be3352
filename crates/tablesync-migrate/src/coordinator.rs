//! Per-table execution of an approved migration

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use crate::{
    ConflictDetector, ConnectionExecutor, MigrationError, MigrationRequest, Result, SyncOptions,
    TableStatsCollector,
};

/// Terminal status of one table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableSyncStatus {
    Succeeded,
    Failed,
    /// Never attempted: excluded by the caller or cancelled before it started
    Skipped,
}

impl std::fmt::Display for TableSyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TableSyncStatus::Succeeded => "succeeded",
            TableSyncStatus::Failed => "failed",
            TableSyncStatus::Skipped => "skipped",
        })
    }
}

/// Result of one table attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSyncOutcome {
    pub name: String,
    pub status: TableSyncStatus,
    pub error_detail: Option<String>,
    /// Rows written to the target (0 for schema-only runs)
    pub rows_copied: u64,
    pub elapsed_ms: u64,
}

impl TableSyncOutcome {
    pub fn succeeded(name: impl Into<String>, rows_copied: u64, elapsed_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: TableSyncStatus::Succeeded,
            error_detail: None,
            rows_copied,
            elapsed_ms,
        }
    }

    pub fn failed(name: impl Into<String>, detail: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: TableSyncStatus::Failed,
            error_detail: Some(detail.into()),
            rows_copied: 0,
            elapsed_ms,
        }
    }

    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TableSyncStatus::Skipped,
            error_detail: None,
            rows_copied: 0,
            elapsed_ms: 0,
        }
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == TableSyncStatus::Succeeded
    }

    pub fn is_failed(&self) -> bool {
        self.status == TableSyncStatus::Failed
    }

    pub fn is_skipped(&self) -> bool {
        self.status == TableSyncStatus::Skipped
    }
}

/// Live progress events emitted while a run executes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncProgress {
    TableStarted { name: String },
    TableFinished(TableSyncOutcome),
}

/// Why a table attempt did not succeed
enum AttemptError {
    Failed(String),
    TimedOut(u64),
    Cancelled,
}

impl AttemptError {
    fn detail(self) -> String {
        match self {
            AttemptError::Failed(detail) => detail,
            AttemptError::TimedOut(ms) => format!("timed out after {} ms", ms),
            AttemptError::Cancelled => "cancelled".to_string(),
        }
    }
}

/// Executes approved runs table by table on a bounded worker pool.
///
/// Every run starts with a fresh precheck; a blocked verdict aborts before
/// any table is touched. After that, tables are independent: one table's
/// failure is recorded in its outcome and never stops its siblings.
pub struct SyncCoordinator<E> {
    executor: Arc<E>,
    detector: ConflictDetector<E>,
    options: SyncOptions,
    progress: Option<mpsc::UnboundedSender<SyncProgress>>,
}

impl<E: ConnectionExecutor> SyncCoordinator<E> {
    pub fn new(executor: Arc<E>, options: SyncOptions) -> Self {
        let detector = ConflictDetector::new(TableStatsCollector::new(executor.clone()));
        Self {
            executor,
            detector,
            options: options.normalized(),
            progress: None,
        }
    }

    /// Send progress events to `sender` during execution
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<SyncProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Execute a request to completion
    pub async fn execute(&self, request: &MigrationRequest) -> Result<Vec<TableSyncOutcome>> {
        self.execute_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Execute a request, stopping early when `cancel` fires.
    ///
    /// On cancellation, finished tables keep their outcome, tables in flight
    /// fail with "cancelled" and tables not yet started are skipped. The
    /// returned list always has exactly one outcome per working-set table,
    /// in working-set order.
    #[tracing::instrument(skip(self, request, cancel), fields(
        source = %request.source_conn,
        source_db = %request.source_db,
        target = %request.target_conn,
        target_db = %request.target_db,
        mode = %request.mode,
    ))]
    pub async fn execute_with_cancel(
        &self,
        request: &MigrationRequest,
        cancel: CancellationToken,
    ) -> Result<Vec<TableSyncOutcome>> {
        tracing::info!("starting migration run");

        let verdict = self.detector.precheck(request).await?;
        if verdict.blocked {
            tracing::warn!(blocking = ?verdict.blocking_tables(), "migration blocked, no table touched");
            return Err(MigrationError::Blocked(verdict));
        }

        let tables = verdict.table_names();
        tracing::info!(
            tables = tables.len(),
            max_workers = self.options.max_workers,
            "precheck clear, copying tables"
        );

        let request = Arc::new(request.clone());
        let semaphore = Arc::new(Semaphore::new(self.options.max_workers));
        let mut handles = Vec::with_capacity(tables.len());

        for table in tables {
            let job = TableJob {
                executor: self.executor.clone(),
                request: request.clone(),
                table: table.clone(),
                timeout: self.options.table_timeout(),
                progress: self.progress.clone(),
            };
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();

            let handle = tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    tracing::debug!(table = %job.table, "table skipped before start");
                    return TableSyncOutcome::skipped(job.table);
                };
                job.run(cancel).await
            });
            handles.push((table, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (table, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(table = %table, error = %e, "table task aborted");
                    outcomes.push(TableSyncOutcome::failed(
                        table,
                        format!("task error: {}", e),
                        0,
                    ));
                }
            }
        }

        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        let skipped = outcomes.iter().filter(|o| o.is_skipped()).count();
        tracing::info!(
            tables = outcomes.len(),
            succeeded = outcomes.len() - failed - skipped,
            failed = failed,
            skipped = skipped,
            "migration run finished"
        );
        Ok(outcomes)
    }
}

/// Everything one table worker needs, owned so it can move into a task
struct TableJob<E: ConnectionExecutor> {
    executor: Arc<E>,
    request: Arc<MigrationRequest>,
    table: String,
    timeout: Option<Duration>,
    progress: Option<mpsc::UnboundedSender<SyncProgress>>,
}

impl<E: ConnectionExecutor> TableJob<E> {
    fn emit(&self, event: SyncProgress) {
        if let Some(progress) = &self.progress {
            // A dropped receiver only means nobody is watching
            let _ = progress.send(event);
        }
    }

    async fn run(self, cancel: CancellationToken) -> TableSyncOutcome {
        if cancel.is_cancelled() {
            return TableSyncOutcome::skipped(self.table);
        }

        tracing::info!(table = %self.table, "table started");
        self.emit(SyncProgress::TableStarted {
            name: self.table.clone(),
        });

        let start = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AttemptError::Cancelled),
            result = self.attempt_with_timeout() => result,
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(rows) => {
                tracing::info!(table = %self.table, rows = rows, elapsed_ms = elapsed_ms, "table finished");
                TableSyncOutcome::succeeded(&self.table, rows, elapsed_ms)
            }
            Err(e) => {
                let detail = e.detail();
                tracing::error!(table = %self.table, error = %detail, elapsed_ms = elapsed_ms, "table failed");
                TableSyncOutcome::failed(&self.table, detail, elapsed_ms)
            }
        };

        self.emit(SyncProgress::TableFinished(outcome.clone()));
        outcome
    }

    async fn attempt_with_timeout(&self) -> std::result::Result<u64, AttemptError> {
        let Some(limit) = self.timeout else {
            return self.attempt().await.map_err(AttemptError::Failed);
        };
        match tokio::time::timeout(limit, self.attempt()).await {
            Ok(result) => result.map_err(AttemptError::Failed),
            Err(_) => Err(AttemptError::TimedOut(limit.as_millis() as u64)),
        }
    }

    /// Copy schema and/or rows for one table, returning rows copied
    async fn attempt(&self) -> std::result::Result<u64, String> {
        let request = &self.request;
        let table = self.table.as_str();

        let source = self
            .executor
            .resolve_connection(&request.source_conn)
            .await
            .map_err(|e| format!("source connection '{}': {}", request.source_conn, e))?;
        let target = self
            .executor
            .resolve_connection(&request.target_conn)
            .await
            .map_err(|e| format!("target connection '{}': {}", request.target_conn, e))?;

        if request.mode.copies_schema() {
            self.executor
                .copy_schema(&source, &request.source_db, &target, &request.target_db, table)
                .await
                .map_err(|e| format!("schema copy failed: {}", e))?;
        }

        if request.mode.copies_data() {
            return self
                .executor
                .copy_data(&source, &request.source_db, &target, &request.target_db, table)
                .await
                .map_err(|e| format!("data copy failed: {}", e));
        }

        Ok(0)
    }
}
