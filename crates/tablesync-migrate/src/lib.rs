//! TableSync Migrate - Table migration engine
//!
//! Copies schema and/or data for a set of tables from a source database to a
//! target database, refusing to start when that would overwrite or duplicate
//! data on the target.
//!
//! # Flow
//!
//! 1. [`MigrationRequest::validate`] rejects malformed and self-referential
//!    requests before any collaborator is touched.
//! 2. [`ConflictDetector::precheck`] lists table statistics on both sides and
//!    classifies every table in the working set into a [`RunVerdict`].
//! 3. [`SyncCoordinator::execute`] re-runs the precheck, refuses a blocked
//!    verdict with [`MigrationError::Blocked`], and otherwise copies each table
//!    independently on a bounded worker pool.
//!
//! [`MigrationRun`] tracks one request through that lifecycle and
//! [`MigrationEngine`] ties the pieces together over a [`ConnectionExecutor`].

mod conflict;
mod coordinator;
mod engine;
mod error;
mod executor;
mod options;
mod report;
mod request;
mod run;
mod stats;

#[cfg(test)]
mod test_support;

pub use conflict::{CheckReason, ConflictDetector, RunVerdict, TableCheckResult, classify};
pub use coordinator::{SyncCoordinator, SyncProgress, TableSyncOutcome, TableSyncStatus};
pub use engine::MigrationEngine;
pub use error::{MigrationError, Result};
pub use executor::{ConnectionExecutor, DriverExecutor};
pub use options::SyncOptions;
pub use report::SyncReport;
pub use request::{MigrationMode, MigrationRequest};
pub use run::{MigrationRun, RunState};
pub use stats::TableStatsCollector;
