//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::mapping::RelationshipNameFrom;

/// Root configuration structure of a YAML job file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database connection.
    pub source: ConnectionConfig,

    /// Export behavior.
    #[serde(default)]
    pub export: ExportSettings,
}

/// Supported source engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[default]
    Mysql,
    Postgres,
}

impl DatabaseType {
    /// Default server port for the engine.
    pub fn default_port(self) -> u16 {
        match self {
            DatabaseType::Mysql => 3306,
            DatabaseType::Postgres => 5432,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DatabaseType::Mysql => "mysql",
            DatabaseType::Postgres => "postgres",
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source database connection parameters.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database type (default: mysql).
    #[serde(default, rename = "type")]
    pub database_type: DatabaseType,

    /// Database host (default: localhost).
    #[serde(default = "default_host")]
    pub host: String,

    /// Database port (default: 3306 for MySQL, 5432 for PostgreSQL).
    #[serde(default)]
    pub port: Option<u16>,

    /// Database name. Also the default schema for unqualified table names
    /// on MySQL.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Schema used for unqualified table names on PostgreSQL (default: "public").
    #[serde(default)]
    pub schema: Option<String>,
}

impl ConnectionConfig {
    /// Effective port.
    pub fn port(&self) -> u16 {
        self.port
            .unwrap_or_else(|| self.database_type.default_port())
    }

    /// Schema that unqualified table names resolve to.
    pub fn default_schema(&self) -> &str {
        match (self.database_type, &self.schema) {
            (_, Some(schema)) => schema,
            (DatabaseType::Mysql, None) => &self.database,
            (DatabaseType::Postgres, None) => "public",
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("database_type", &self.database_type)
            .field("host", &self.host)
            .field("port", &self.port())
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .finish()
    }
}

/// Export behavior configuration.
///
/// Optional fields distinguish "not set" (fall back to the import-tool
/// options file, then the built-in default) from an explicit value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Existing directory that receives the CSV files.
    #[serde(default)]
    pub destination: Option<PathBuf>,

    /// Referenced (parent) table, `schema.table` or bare name.
    #[serde(default)]
    pub parent_table: Option<String>,

    /// Referencing (child) table, `schema.table` or bare name.
    #[serde(default)]
    pub child_table: Option<String>,

    /// Where relationship types are derived from (default: table).
    #[serde(default)]
    pub relationship_name_from: RelationshipNameFrom,

    /// Mapping document. `generate-mapping` writes it; `export` reads it
    /// when present and skips discovery.
    #[serde(default)]
    pub mapping_file: Option<String>,

    /// Import-tool options file (JSON).
    #[serde(default)]
    pub options_file: Option<PathBuf>,

    /// Field delimiter override.
    #[serde(default)]
    pub delimiter: Option<String>,

    /// Quote character override.
    #[serde(default)]
    pub quote: Option<String>,

    /// Multiline fields override.
    #[serde(default)]
    pub multiline_fields: Option<bool>,

    /// Resources exported concurrently (default: 1).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Rows written between cancellation checks (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            destination: None,
            parent_table: None,
            child_table: None,
            relationship_name_from: RelationshipNameFrom::default(),
            mapping_file: None,
            options_file: None,
            delimiter: None,
            quote: None,
            multiline_fields: None,
            workers: default_workers(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_workers() -> usize {
    1
}

fn default_batch_size() -> usize {
    1000
}
