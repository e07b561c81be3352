//! Entry points for callers driving migrations

use std::sync::Arc;
use tablesync_core::TableStat;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    ConflictDetector, ConnectionExecutor, MigrationError, MigrationRequest, MigrationRun, Result,
    RunVerdict, SyncCoordinator, SyncOptions, SyncProgress, SyncReport, TableStatsCollector,
    TableSyncOutcome,
};

/// Facade over the statistics collector, conflict detector and coordinator
pub struct MigrationEngine<E> {
    collector: TableStatsCollector<E>,
    detector: ConflictDetector<E>,
    coordinator: SyncCoordinator<E>,
}

impl<E: ConnectionExecutor> MigrationEngine<E> {
    pub fn new(executor: Arc<E>, options: SyncOptions) -> Self {
        let collector = TableStatsCollector::new(executor.clone());
        Self {
            detector: ConflictDetector::new(collector.clone()),
            collector,
            coordinator: SyncCoordinator::new(executor, options),
        }
    }

    /// Send per-table progress events to `sender` while executing
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<SyncProgress>) -> Self {
        self.coordinator = self.coordinator.with_progress(sender);
        self
    }

    pub fn options(&self) -> &SyncOptions {
        self.coordinator.options()
    }

    pub async fn list_table_stats(
        &self,
        connection_id: &str,
        database: &str,
    ) -> Result<Vec<TableStat>> {
        self.collector.list_table_stats(connection_id, database).await
    }

    pub async fn precheck(&self, request: &MigrationRequest) -> Result<RunVerdict> {
        self.detector.precheck(request).await
    }

    pub async fn execute(&self, request: &MigrationRequest) -> Result<Vec<TableSyncOutcome>> {
        self.coordinator.execute(request).await
    }

    pub async fn execute_with_cancel(
        &self,
        request: &MigrationRequest,
        cancel: CancellationToken,
    ) -> Result<Vec<TableSyncOutcome>> {
        self.coordinator.execute_with_cancel(request, cancel).await
    }

    /// Precheck a run's current request and record the verdict on it
    ///
    /// Running, completed and aborted runs are rejected with `InvalidState`.
    pub async fn precheck_run(&self, run: &mut MigrationRun) -> Result<RunVerdict> {
        run.ensure_open("precheck")?;
        match self.detector.precheck(run.request()).await {
            Ok(verdict) => {
                run.record_verdict(verdict.clone());
                Ok(verdict)
            }
            Err(e) => {
                run.reset();
                Err(e)
            }
        }
    }

    /// Execute a checked, clear run.
    ///
    /// A blocked fresh precheck leaves the run aborted with that verdict.
    /// Other request-level errors send the run back to draft.
    pub async fn execute_run(
        &self,
        run: &mut MigrationRun,
        cancel: CancellationToken,
    ) -> Result<SyncReport> {
        let request = run.begin()?;

        match self.coordinator.execute_with_cancel(&request, cancel).await {
            Ok(outcomes) => {
                run.complete(outcomes);
                Ok(SyncReport::new(run.outcomes().unwrap_or_default().to_vec()))
            }
            Err(MigrationError::Blocked(verdict)) => {
                run.abort(verdict.clone());
                Err(MigrationError::Blocked(verdict))
            }
            Err(e) => {
                run.reset();
                Err(e)
            }
        }
    }
}
