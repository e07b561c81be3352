//! Database driver trait definition

use crate::{Connection, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Core driver trait that all database drivers must implement
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Unique identifier for this driver (e.g., "mysql")
    fn id(&self) -> &'static str {
        self.name()
    }

    /// Short name used in saved connections (e.g., "mysql")
    fn name(&self) -> &'static str;

    /// Display name for output
    fn display_name(&self) -> &'static str {
        self.name()
    }

    /// Default connection port (None for file-based databases)
    fn default_port(&self) -> Option<u16> {
        None
    }

    /// Create a new connection
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>>;

    /// Test connection without keeping it open
    async fn test_connection(&self, config: &ConnectionConfig) -> Result<()>;

    /// Build a connection string from configuration. Passwords are never
    /// included.
    fn build_connection_string(&self, config: &ConnectionConfig) -> String;
}

/// Connection configuration handed to a driver
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Display name
    pub name: String,
    /// Driver ID (e.g., "mysql")
    pub driver: String,
    /// Host address (empty for file-based databases)
    pub host: String,
    /// Port number (0 for the driver default)
    pub port: u16,
    /// Default database
    pub database: Option<String>,
    /// Username
    pub username: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Additional connection parameters
    pub params: HashMap<String, String>,
}

impl ConnectionConfig {
    /// Create a new configuration with default values
    pub fn new(driver: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            driver: driver.to_string(),
            host: String::new(),
            port: 0,
            database: None,
            username: None,
            password: None,
            params: HashMap::new(),
        }
    }

    /// Create a MySQL configuration
    pub fn new_mysql(host: &str, port: u16, username: &str) -> Self {
        let mut config = Self::new("mysql", "MySQL");
        config.host = host.to_string();
        config.port = port;
        config.username = Some(username.to_string());
        config
    }

    /// Set a connection parameter
    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Get a string parameter, falling back to the well-known fields
    pub fn get_string(&self, key: &str) -> Option<String> {
        if let Some(val) = self.params.get(key) {
            return Some(val.clone());
        }
        match key {
            "host" => Some(self.host.clone()).filter(|h| !h.is_empty()),
            "database" => self.database.clone(),
            "username" | "user" => self.username.clone(),
            "password" => self.password.clone(),
            _ => None,
        }
    }

    /// Port, or `default` when unset
    pub fn port_or(&self, default: u16) -> u16 {
        if self.port > 0 { self.port } else { default }
    }
}
