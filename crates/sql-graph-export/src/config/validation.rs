//! Configuration validation.

use super::Config;
use crate::error::{EtlError, Result};

/// Validate the configuration, reporting every problem at once.
pub fn validate(config: &Config) -> Result<()> {
    let mut violations = Vec::new();

    // Source validation
    if config.source.host.is_empty() {
        violations.push("source.host is required".to_string());
    }
    if config.source.database.is_empty() {
        violations.push("source.database is required".to_string());
    }
    if config.source.user.is_empty() {
        violations.push("source.user is required".to_string());
    }
    if config.source.port == Some(0) {
        violations.push("source.port must be between 1 and 65535".to_string());
    }

    // Export validation - only check what was explicitly set
    let export = &config.export;
    if export.workers == 0 {
        violations.push("export.workers must be at least 1".to_string());
    }
    if export.batch_size == 0 {
        violations.push("export.batch_size must be at least 1".to_string());
    }
    if export.parent_table.is_some() != export.child_table.is_some() {
        violations.push(
            "export.parent_table and export.child_table must be given together".to_string(),
        );
    }
    if let (Some(parent), Some(child)) = (&export.parent_table, &export.child_table) {
        if parent.eq_ignore_ascii_case(child) {
            violations.push(format!(
                "export.parent_table and export.child_table must differ (both are '{}')",
                parent
            ));
        }
    }
    for (key, value) in [("delimiter", &export.delimiter), ("quote", &export.quote)] {
        if let Some(value) = value {
            if value.is_empty() {
                violations.push(format!("export.{} cannot be empty", key));
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(EtlError::InvalidConfiguration(violations))
    }
}
