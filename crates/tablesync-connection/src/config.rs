//! Saved connection configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tablesync_core::ConnectionConfig;
use uuid::Uuid;

/// A saved database connection profile
#[derive(Clone, Serialize, Deserialize)]
pub struct SavedConnection {
    /// Unique identifier
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Driver type (mysql, ...)
    pub driver: String,

    /// Host address
    #[serde(default)]
    pub host: String,

    /// Port (0 means the driver default)
    #[serde(default)]
    pub port: u16,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Default database
    #[serde(default)]
    pub database: Option<String>,

    /// Extra driver parameters (e.g. `pool_max`)
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl SavedConnection {
    /// Create a new saved connection
    pub fn new(name: impl Into<String>, driver: impl Into<String>) -> Self {
        let name = name.into();
        let driver = driver.into();
        tracing::debug!(name = %name, driver = %driver, "creating new saved connection");
        Self {
            id: Uuid::new_v4(),
            name,
            driver,
            host: String::new(),
            port: 0,
            user: None,
            password: None,
            database: None,
            params: HashMap::new(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: Option<String>) -> Self {
        self.user = Some(user.into());
        self.password = password;
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set a connection parameter
    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    /// `host:port` for display, with the port omitted when unset
    pub fn address(&self) -> String {
        if self.port > 0 {
            format!("{}:{}", self.host, self.port)
        } else {
            self.host.clone()
        }
    }

    /// Build the driver-facing configuration for this profile
    pub fn to_connection_config(&self) -> ConnectionConfig {
        let has_password = self.password.is_some();
        let param_keys: Vec<_> = self.params.keys().collect();
        tracing::debug!(
            connection_id = %self.id,
            has_password = has_password,
            param_keys = ?param_keys,
            "building connection config from saved profile"
        );

        let mut config = ConnectionConfig::new(&self.driver, &self.name);
        config.host = self.host.clone();
        config.port = self.port;
        config.username = self.user.clone();
        config.password = self.password.clone();
        config.database = self.database.clone();
        for (key, value) in &self.params {
            config = config.with_param(key, value.clone());
        }
        config
    }
}

impl std::fmt::Debug for SavedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SavedConnection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("params", &self.params)
            .finish()
    }
}
