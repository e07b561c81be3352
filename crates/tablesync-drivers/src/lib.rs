//! TableSync Drivers - Database driver implementations
//!
//! This crate wires the concrete drivers into a name-keyed registry. Each
//! driver lives in its own crate under `crates/` and is enabled by feature.

#[cfg(feature = "mysql")]
pub use tablesync_driver_mysql as mysql;

mod registry;

pub use registry::DriverRegistry;

/// Re-export commonly used types from tablesync-core
pub use tablesync_core::{
    Connection, ConnectionConfig, DatabaseDriver, QueryResult, Result, Row, RowBatcher, RowSink,
    StatementResult, TableStat, TableSyncError, TableTransfer, Value,
};
