//! Error types for schema discovery and CSV export.

use thiserror::Error;

/// Main error type for export operations.
///
/// Every variant is fatal to the enclosing export job: there is no
/// per-resource retry or partial-success mode.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Table or join metadata could not be discovered.
    #[error("Schema discovery failed for {object}: {message}")]
    SchemaDiscovery { object: String, message: String },

    /// One or more configuration violations (all of them are listed).
    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfiguration(Vec<String>),

    /// SQL execution or file I/O failed while exporting a resource.
    #[error("Export failed for resource {resource}: {message}")]
    Export { resource: String, message: String },

    /// A mapping document could not be read or is malformed.
    #[error("Mapping document {location} is invalid: {message}")]
    MappingDocument { location: String, message: String },

    /// Database driver error outside of a specific resource.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Export was cancelled (SIGINT, etc.)
    #[error("Export cancelled")]
    Cancelled,
}

impl EtlError {
    /// Create a SchemaDiscovery error for a table, pair or constraint.
    pub fn discovery(object: impl Into<String>, message: impl ToString) -> Self {
        EtlError::SchemaDiscovery {
            object: object.into(),
            message: message.to_string(),
        }
    }

    /// Create an InvalidConfiguration error with a single violation.
    pub fn config(message: impl Into<String>) -> Self {
        EtlError::InvalidConfiguration(vec![message.into()])
    }

    /// Create an Export error for a resource.
    pub fn export(resource: impl Into<String>, message: impl ToString) -> Self {
        EtlError::Export {
            resource: resource.into(),
            message: message.to_string(),
        }
    }

    /// Create a MappingDocument error.
    pub fn mapping(location: impl Into<String>, message: impl ToString) -> Self {
        EtlError::MappingDocument {
            location: location.into(),
            message: message.to_string(),
        }
    }

    /// Process exit code used by the CLI for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            EtlError::InvalidConfiguration(_) | EtlError::Yaml(_) => 2,
            EtlError::SchemaDiscovery { .. } => 3,
            EtlError::Export { .. } => 4,
            EtlError::MappingDocument { .. } => 5,
            EtlError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        if let EtlError::InvalidConfiguration(violations) = self {
            for violation in violations {
                output.push_str(&format!("  - {}\n", violation));
            }
        }

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, EtlError>;
