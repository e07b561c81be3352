//! MySQL driver implementation

use async_trait::async_trait;
use std::sync::Arc;
use tablesync_core::{Connection, ConnectionConfig, DatabaseDriver, Result, TableSyncError};

use crate::MySqlConnection;
use crate::connection::DEFAULT_POOL_MAX;

/// MySQL database driver
pub struct MySqlDriver;

impl MySqlDriver {
    /// Create a new MySQL driver instance
    pub fn new() -> Self {
        tracing::debug!("MySQL driver initialized");
        Self
    }
}

impl Default for MySqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Pool size from the `pool_max` connection parameter
fn pool_max(config: &ConnectionConfig) -> Result<usize> {
    match config.params.get("pool_max") {
        None => Ok(DEFAULT_POOL_MAX),
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                TableSyncError::Configuration(format!(
                    "pool_max must be a positive integer, got '{}'",
                    raw
                ))
            }),
    }
}

#[async_trait]
impl DatabaseDriver for MySqlDriver {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn display_name(&self) -> &'static str {
        "MySQL"
    }

    fn default_port(&self) -> Option<u16> {
        Some(3306)
    }

    #[tracing::instrument(skip(self, config), fields(host = %config.host, port = config.port, database = ?config.database))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let host = config
            .get_string("host")
            .unwrap_or_else(|| "localhost".to_string());
        let port = config.port_or(3306);
        let database = config.get_string("database");
        let user = config.get_string("user");
        let password = config.get_string("password");

        let conn = MySqlConnection::connect(
            &host,
            port,
            database.as_deref(),
            user.as_deref(),
            password.as_deref(),
            pool_max(config)?,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to connect to MySQL database");
            e
        })?;

        tracing::info!(host = %host, port = %port, database = ?database, "MySQL connection created");
        Ok(Arc::new(conn))
    }

    #[tracing::instrument(skip(self, config))]
    async fn test_connection(&self, config: &ConnectionConfig) -> Result<()> {
        tracing::debug!("testing MySQL connection");
        let conn = self.connect(config).await?;
        let ping = conn.query("SELECT 1", &[]).await;
        conn.close().await?;
        ping.map(|_| ())
    }

    fn build_connection_string(&self, config: &ConnectionConfig) -> String {
        let host = config
            .get_string("host")
            .unwrap_or_else(|| "localhost".to_string());
        let port = config.port_or(3306);

        let mut conn_str = String::from("mysql://");
        if let Some(u) = config.get_string("user") {
            conn_str.push_str(&u);
            conn_str.push('@');
        }
        conn_str.push_str(&format!("{}:{}", host, port));
        if let Some(db) = config.get_string("database") {
            conn_str.push('/');
            conn_str.push_str(&db);
        }
        conn_str
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_string_omits_password() {
        let mut config = ConnectionConfig::new_mysql("db.internal", 3307, "app");
        config.password = Some("secret".into());
        config.database = Some("shop".into());

        let driver = MySqlDriver::new();
        let conn_str = driver.build_connection_string(&config);

        assert_eq!(conn_str, "mysql://app@db.internal:3307/shop");
        assert!(!conn_str.contains("secret"));
    }

    #[test]
    fn test_connection_string_defaults() {
        let config = ConnectionConfig::new("mysql", "local");
        let driver = MySqlDriver::new();

        assert_eq!(driver.build_connection_string(&config), "mysql://localhost:3306");
        assert_eq!(driver.default_port(), Some(3306));
        assert_eq!(driver.id(), "mysql");
    }

    #[test]
    fn test_pool_max_param() {
        let config = ConnectionConfig::new("mysql", "local");
        assert_eq!(pool_max(&config).unwrap(), DEFAULT_POOL_MAX);

        let config = config.with_param("pool_max", "8");
        assert_eq!(pool_max(&config).unwrap(), 8);

        let config = config.with_param("pool_max", "0");
        assert!(matches!(
            pool_max(&config),
            Err(TableSyncError::Configuration(_))
        ));
    }
}
