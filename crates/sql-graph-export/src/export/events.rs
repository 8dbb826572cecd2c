//! Progress events emitted while exporting.

use std::path::PathBuf;

use serde::Serialize;

/// One progress notification. Sent over an optional unbounded channel so
/// the exporter never waits on a slow consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExportEvent {
    ResourceStarted {
        resource: String,
        path: PathBuf,
    },
    /// Emitted every `batch_size` rows.
    RowsWritten {
        resource: String,
        rows: u64,
    },
    ResourceCompleted {
        resource: String,
        rows: u64,
        multiline: bool,
    },
    ExportCompleted {
        resources: usize,
        rows: u64,
    },
}
