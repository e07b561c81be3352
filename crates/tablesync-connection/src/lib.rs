//! TableSync Connection - Saved connection profiles and live session management
//!
//! A `SavedConnection` is the persisted profile (host, credentials, default
//! database). The `ConnectionManager` stores profiles and turns a profile id
//! into a live `Connection`, reusing the session on later calls.

mod config;
mod manager;

pub use config::SavedConnection;
pub use manager::ConnectionManager;
