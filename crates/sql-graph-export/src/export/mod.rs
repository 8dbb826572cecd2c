//! CSV export: validated job configuration, the exporter and its results.

mod config;
mod events;
mod executor;
mod results;

pub use config::{ExportToCsvConfig, ExportToCsvConfigParts};
pub use events::ExportEvent;
pub use executor::{csv_writer, CsvExporter, DEFAULT_BATCH_SIZE};
pub use results::{ExportToCsvResults, ExportedFile};
