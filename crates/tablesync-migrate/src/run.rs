//! Lifecycle of one migration request

use std::collections::BTreeSet;

use crate::{MigrationError, MigrationMode, MigrationRequest, Result, RunVerdict, TableSyncOutcome};

/// Where a run is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Request built or changed, no valid verdict
    Draft,
    /// Verdict computed for the current request
    Checked(RunVerdict),
    Running,
    /// Terminal: one outcome per working-set table plus caller exclusions
    Completed(Vec<TableSyncOutcome>),
    /// Terminal: the fresh precheck at execution time was blocked
    Aborted(RunVerdict),
}

impl RunState {
    pub fn name(&self) -> &'static str {
        match self {
            RunState::Draft => "draft",
            RunState::Checked(v) if v.blocked => "checked/blocked",
            RunState::Checked(_) => "checked/clear",
            RunState::Running => "running",
            RunState::Completed(_) => "completed",
            RunState::Aborted(_) => "aborted",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A request together with its latest verdict and, once executed, outcomes.
///
/// Changing the request drops the verdict, so a stale "clear" can never
/// authorize a different request. The only exception is
/// [`MigrationRun::narrow_selection`] on a clear verdict, which can only
/// remove tables.
#[derive(Debug, Clone)]
pub struct MigrationRun {
    request: MigrationRequest,
    state: RunState,
    excluded: BTreeSet<String>,
}

impl MigrationRun {
    pub fn new(request: MigrationRequest) -> Self {
        Self {
            request,
            state: RunState::Draft,
            excluded: BTreeSet::new(),
        }
    }

    pub fn request(&self) -> &MigrationRequest {
        &self.request
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Tables removed by [`MigrationRun::narrow_selection`]
    pub fn excluded(&self) -> &BTreeSet<String> {
        &self.excluded
    }

    /// The latest verdict, if the run is checked or aborted
    pub fn verdict(&self) -> Option<&RunVerdict> {
        match &self.state {
            RunState::Checked(verdict) | RunState::Aborted(verdict) => Some(verdict),
            _ => None,
        }
    }

    pub fn outcomes(&self) -> Option<&[TableSyncOutcome]> {
        match &self.state {
            RunState::Completed(outcomes) => Some(outcomes),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(&self.state, RunState::Checked(v) if v.is_clear())
    }

    /// Whether the run has started executing or reached a terminal state
    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            RunState::Running | RunState::Completed(_) | RunState::Aborted(_)
        )
    }

    /// Running, completed and aborted runs are immutable
    pub(crate) fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.is_finished() {
            return Err(MigrationError::InvalidState {
                operation,
                state: self.state.to_string(),
            });
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        if !matches!(self.state, RunState::Draft) {
            tracing::debug!(from = %self.state, "request changed, verdict invalidated");
        }
        self.state = RunState::Draft;
    }

    /// Replace the table selection (empty = all source tables)
    pub fn set_selected_tables<I, S>(&mut self, tables: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_open("change the table selection")?;
        self.request.selected_tables = tables.into_iter().map(Into::into).collect();
        self.excluded.clear();
        self.invalidate();
        Ok(())
    }

    pub fn set_mode(&mut self, mode: MigrationMode) -> Result<()> {
        self.ensure_open("change the mode")?;
        self.request.mode = mode;
        self.invalidate();
        Ok(())
    }

    pub fn set_source_database(&mut self, database: impl Into<String>) -> Result<()> {
        self.ensure_open("change the source database")?;
        self.request.source_db = database.into();
        self.invalidate();
        Ok(())
    }

    pub fn set_target_database(&mut self, database: impl Into<String>) -> Result<()> {
        self.ensure_open("change the target database")?;
        self.request.target_db = database.into();
        self.invalidate();
        Ok(())
    }

    /// Remove tables from the checked working set.
    ///
    /// On a clear verdict the run stays checked, since removing tables can
    /// only remove blocking reasons. On a blocked verdict the run returns to
    /// draft and must be checked again. Names outside the working set are
    /// ignored. Removing every table is rejected because an empty selection
    /// means "all tables".
    pub fn narrow_selection<I, S>(&mut self, excluded: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let RunState::Checked(verdict) = &self.state else {
            return Err(MigrationError::InvalidState {
                operation: "narrow the selection",
                state: self.state.to_string(),
            });
        };

        let working: BTreeSet<String> = verdict.table_names().into_iter().collect();
        let removed: BTreeSet<String> = excluded
            .into_iter()
            .map(Into::into)
            .filter(|t| working.contains(t))
            .collect();
        if removed.is_empty() {
            return Ok(());
        }

        let remaining: BTreeSet<String> = working.difference(&removed).cloned().collect();
        if remaining.is_empty() {
            return Err(MigrationError::InvalidRequest(
                "narrowing would leave no tables to migrate".into(),
            ));
        }

        let still_clear = verdict.is_clear();
        let narrowed = verdict.clone().without(&removed);
        tracing::info!(removed = ?removed, remaining = remaining.len(), "selection narrowed");

        self.request.selected_tables = remaining;
        self.excluded.extend(removed);
        self.state = if still_clear {
            RunState::Checked(narrowed)
        } else {
            RunState::Draft
        };
        Ok(())
    }

    /// Record a precheck result for the current request
    pub(crate) fn record_verdict(&mut self, verdict: RunVerdict) {
        self.state = RunState::Checked(verdict);
    }

    /// Forget any verdict after a failed precheck or execution
    pub(crate) fn reset(&mut self) {
        self.state = RunState::Draft;
    }

    /// Move a clear run to running, returning the request to execute
    pub(crate) fn begin(&mut self) -> Result<MigrationRequest> {
        if !self.is_ready() {
            return Err(MigrationError::InvalidState {
                operation: "execute",
                state: self.state.to_string(),
            });
        }
        self.state = RunState::Running;
        Ok(self.request.clone())
    }

    /// Complete the run; caller exclusions are appended as skipped outcomes
    pub(crate) fn complete(&mut self, mut outcomes: Vec<TableSyncOutcome>) {
        outcomes.extend(self.excluded.iter().map(TableSyncOutcome::skipped));
        self.state = RunState::Completed(outcomes);
    }

    pub(crate) fn abort(&mut self, verdict: RunVerdict) {
        self.state = RunState::Aborted(verdict);
    }
}
