//! Migration requests and their validation

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::{MigrationError, Result};

/// What a migration copies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationMode {
    /// Create the table structure only
    #[serde(rename = "schema")]
    SchemaOnly,
    /// Copy rows into tables that already exist on the target
    #[serde(rename = "data")]
    DataOnly,
    /// Create the structure, then copy rows
    Both,
}

impl MigrationMode {
    pub const ALL: [MigrationMode; 3] = [Self::SchemaOnly, Self::DataOnly, Self::Both];

    pub fn copies_schema(self) -> bool {
        matches!(self, Self::SchemaOnly | Self::Both)
    }

    pub fn copies_data(self) -> bool {
        matches!(self, Self::DataOnly | Self::Both)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SchemaOnly => "schema",
            Self::DataOnly => "data",
            Self::Both => "both",
        }
    }
}

impl std::fmt::Display for MigrationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationMode {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "schema" => Ok(Self::SchemaOnly),
            "data" => Ok(Self::DataOnly),
            "both" => Ok(Self::Both),
            other => Err(MigrationError::InvalidRequest(format!(
                "unknown migration mode '{}', expected schema, data or both",
                other
            ))),
        }
    }
}

/// One migration request.
///
/// `selected_tables` empty means every table in the source database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRequest {
    pub source_conn: String,
    pub source_db: String,
    pub selected_tables: BTreeSet<String>,
    pub target_conn: String,
    pub target_db: String,
    pub mode: MigrationMode,
}

impl MigrationRequest {
    pub fn new(
        source_conn: impl Into<String>,
        source_db: impl Into<String>,
        target_conn: impl Into<String>,
        target_db: impl Into<String>,
        mode: MigrationMode,
    ) -> Self {
        Self {
            source_conn: source_conn.into(),
            source_db: source_db.into(),
            selected_tables: BTreeSet::new(),
            target_conn: target_conn.into(),
            target_db: target_db.into(),
            mode,
        }
    }

    /// Restrict the request to the given tables
    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the request covers every source table
    pub fn selects_all(&self) -> bool {
        self.selected_tables.is_empty()
    }

    /// Check the request before anything talks to a database.
    ///
    /// Connection ids are compared as written; use
    /// [`MigrationRequest::validate_with`] when several ids can name one
    /// profile.
    pub fn validate(&self) -> Result<()> {
        self.validate_with(|a, b| a == b)
    }

    /// Like [`MigrationRequest::validate`], with `same_connection` deciding
    /// whether the source and target ids name the same profile
    pub fn validate_with(&self, same_connection: impl Fn(&str, &str) -> bool) -> Result<()> {
        for (field, value) in [
            ("source connection", &self.source_conn),
            ("source database", &self.source_db),
            ("target connection", &self.target_conn),
            ("target database", &self.target_db),
        ] {
            if value.trim().is_empty() {
                return Err(MigrationError::InvalidRequest(format!(
                    "{} must not be empty",
                    field
                )));
            }
        }

        if self.source_db == self.target_db && same_connection(&self.source_conn, &self.target_conn)
        {
            return Err(MigrationError::InvalidRequest(format!(
                "source and target are the same database ('{}' on '{}')",
                self.source_db, self.source_conn
            )));
        }

        if self.selected_tables.iter().any(|t| t.trim().is_empty()) {
            return Err(MigrationError::InvalidRequest(
                "table names must not be empty".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
