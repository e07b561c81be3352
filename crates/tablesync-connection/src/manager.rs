//! Connection manager for handling saved profiles and live sessions

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tablesync_core::{Connection, Result, TableSyncError};
use tablesync_drivers::DriverRegistry;
use uuid::Uuid;

use crate::SavedConnection;

/// Manages saved connection profiles and the sessions opened from them
pub struct ConnectionManager {
    /// Driver registry
    drivers: DriverRegistry,

    /// Open sessions keyed by profile id
    active: RwLock<HashMap<Uuid, Arc<dyn Connection>>>,

    /// Saved connection profiles
    saved: RwLock<Vec<SavedConnection>>,

    /// Path to save connections
    storage_path: Option<PathBuf>,
}

impl ConnectionManager {
    /// Create a new connection manager
    pub fn new() -> Self {
        Self {
            drivers: DriverRegistry::with_defaults(),
            active: RwLock::new(HashMap::new()),
            saved: RwLock::new(Vec::new()),
            storage_path: None,
        }
    }

    /// Create a new connection manager with storage path
    pub fn with_storage_path(path: PathBuf) -> Self {
        Self {
            storage_path: Some(path),
            ..Self::new()
        }
    }

    /// Replace the driver registry
    pub fn with_drivers(mut self, drivers: DriverRegistry) -> Self {
        self.drivers = drivers;
        self
    }

    /// Get the driver registry
    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    /// Return a live session for a saved profile, opening one if needed.
    ///
    /// A session that is still open is reused. Concurrent callers racing on
    /// the same id end up sharing whichever session was registered first.
    #[tracing::instrument(skip(self), fields(connection_id = %id))]
    pub async fn resolve(&self, id: Uuid) -> Result<Arc<dyn Connection>> {
        if let Some(conn) = self.get(id)
            && !conn.is_closed()
        {
            return Ok(conn);
        }

        let saved = self
            .get_saved(id)
            .ok_or_else(|| TableSyncError::NotFound(format!("Connection {} not found", id)))?;
        let conn = self.open(&saved).await?;

        let (winner, loser) = {
            let mut active = self.active.write();
            match active.get(&id) {
                Some(existing) if !existing.is_closed() => (existing.clone(), Some(conn)),
                _ => {
                    active.insert(id, conn.clone());
                    (conn, None)
                }
            }
        };
        if let Some(extra) = loser {
            tracing::debug!("another caller opened the session first, closing duplicate");
            if let Err(e) = extra.close().await {
                tracing::warn!(error = %e, "failed to close duplicate session");
            }
        }

        Ok(winner)
    }

    async fn open(&self, saved: &SavedConnection) -> Result<Arc<dyn Connection>> {
        tracing::info!(connection_name = %saved.name, driver = %saved.driver, "connecting to saved connection");
        let driver = self
            .drivers
            .get(&saved.driver)
            .ok_or_else(|| TableSyncError::Driver(format!("Unknown driver: {}", saved.driver)))?;

        let conn = driver
            .connect(&saved.to_connection_config())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to connect");
                e
            })?;

        tracing::info!(connection_id = %saved.id, "connection established");
        Ok(conn)
    }

    /// Disconnect a connection
    #[tracing::instrument(skip(self), fields(connection_id = %id))]
    pub async fn disconnect(&self, id: Uuid) -> Result<()> {
        tracing::info!("disconnecting connection");
        let conn = self.active.write().remove(&id);
        if let Some(conn) = conn {
            conn.close().await?;
        }
        Ok(())
    }

    /// Disconnect every open session. All sessions are closed even when one
    /// of them fails; the first error is returned.
    pub async fn disconnect_all(&self) -> Result<()> {
        let sessions: Vec<_> = self.active.write().drain().collect();
        tracing::info!(count = sessions.len(), "disconnecting all connections");

        let mut first_error = None;
        for (id, conn) in sessions {
            if let Err(e) = conn.close().await {
                tracing::warn!(connection_id = %id, error = %e, "failed to close connection");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Get an active connection
    pub fn get(&self, id: Uuid) -> Option<Arc<dyn Connection>> {
        let conn = self.active.read().get(&id).cloned();
        if conn.is_none() {
            tracing::debug!(connection_id = %id, "connection not found in active pool");
        }
        conn
    }

    /// Check if a connection is active
    pub fn is_connected(&self, id: Uuid) -> bool {
        self.active
            .read()
            .get(&id)
            .is_some_and(|conn| !conn.is_closed())
    }

    /// Get all saved connections
    pub fn saved_connections(&self) -> Vec<SavedConnection> {
        self.saved.read().clone()
    }

    /// Add a saved connection, replacing one with the same id
    pub fn add_saved(&self, connection: SavedConnection) {
        let mut saved = self.saved.write();
        saved.retain(|c| c.id != connection.id);
        saved.push(connection);
    }

    /// Remove a saved connection
    pub fn remove_saved(&self, id: Uuid) {
        self.saved.write().retain(|c| c.id != id);
    }

    /// Get a saved connection by ID
    pub fn get_saved(&self, id: Uuid) -> Option<SavedConnection> {
        self.saved.read().iter().find(|c| c.id == id).cloned()
    }

    /// Look a profile up by its id or, failing that, its exact name
    pub fn find_saved(&self, key: &str) -> Option<SavedConnection> {
        if let Ok(id) = Uuid::parse_str(key.trim()) {
            return self.get_saved(id);
        }
        self.saved.read().iter().find(|c| c.name == key).cloned()
    }

    /// Load connections from persistent storage
    #[tracing::instrument(skip(self))]
    pub async fn load_from_storage(&self) -> Result<()> {
        tracing::debug!("loading connections from storage");
        if let Some(ref path) = self.storage_path
            && path.exists()
        {
            let content = tokio::fs::read_to_string(path).await?;
            let connections: Vec<SavedConnection> = serde_json::from_str(&content)?;

            tracing::info!(count = connections.len(), "connections loaded from storage");
            *self.saved.write() = connections;
        } else {
            tracing::debug!("no storage path configured or file doesn't exist");
        }
        Ok(())
    }

    /// Save connections to persistent storage
    #[tracing::instrument(skip(self))]
    pub async fn save_to_storage(&self) -> Result<()> {
        tracing::debug!("saving connections to storage");
        if let Some(ref path) = self.storage_path {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let connections = self.saved.read().clone();
            let content = serde_json::to_string_pretty(&connections)?;
            tokio::fs::write(path, content).await?;

            tracing::info!(count = connections.len(), path = ?path, "connections saved to storage");
        } else {
            tracing::debug!("no storage path configured");
        }
        Ok(())
    }

    /// Test a saved connection without activating it
    #[tracing::instrument(skip(self), fields(connection_id = %id))]
    pub async fn test_saved(&self, id: Uuid) -> Result<()> {
        tracing::debug!("testing saved connection");
        let saved = self
            .get_saved(id)
            .ok_or_else(|| TableSyncError::NotFound("Connection not found".into()))?;

        let driver = self
            .drivers
            .get(&saved.driver)
            .ok_or_else(|| TableSyncError::Driver(format!("Unknown driver: {}", saved.driver)))?;

        driver.test_connection(&saved.to_connection_config()).await
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
