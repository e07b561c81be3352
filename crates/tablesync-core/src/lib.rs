//! TableSync Core - Core abstractions and traits for table migration
//!
//! This crate provides the fundamental traits and types that all other
//! TableSync crates depend on. It defines:
//!
//! - `DatabaseDriver` - Trait for database driver implementations
//! - `Connection` - Trait for database connections
//! - `TableTransfer` - Trait for the per-table primitives a migration needs
//!   (statistics, DDL, row transfer)
//! - Common types like `Value`, `Row`, `TableStat`, etc.

mod connection;
mod driver;
mod error;
mod transfer;
mod types;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use transfer::*;
pub use types::*;
