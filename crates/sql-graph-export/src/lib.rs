//! # sql-graph-export
//!
//! Relational schema discovery and CSV export for bulk graph-database import.
//!
//! This library reads a MySQL or PostgreSQL catalog and turns a parent/child
//! table pair into files a bulk graph loader can consume:
//!
//! - **Schema discovery** of tables, primary keys and foreign-key joins
//! - **Mapping generation** from relational columns to node and
//!   relationship CSV fields, saved as a reusable JSON document
//! - **Streaming export** of each mapping to an RFC 4180 CSV file with
//!   configurable delimiter, quote and multiline handling
//! - **Parallel export** with a bounded worker pool and cooperative
//!   cancellation
//! - **Graph-load configuration** describing the files for the import tool
//!
//! ## Example
//!
//! ```rust,no_run
//! use sql_graph_export::{pipeline, Config};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> sql_graph_export::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let summary = pipeline::run_export(&config, CancellationToken::new(), None).await?;
//!     println!("Exported {} rows", summary.rows_exported);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod export;
pub mod graph;
pub mod mapping;
pub mod pipeline;
pub mod schema;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{Config, ConnectionConfig, DatabaseType, ExportSettings, Formatting};
pub use crate::core::{CatalogReader, Dialect, Join, RowSource, SqlValue, Table, TableName, TableNamePair};
pub use drivers::DatabaseClient;
pub use error::{EtlError, Result};
pub use export::{CsvExporter, ExportEvent, ExportToCsvConfig, ExportToCsvResults};
pub use graph::GraphLoadConfig;
pub use mapping::{CsvResource, CsvResourceGenerator, CsvResources, RelationshipNameFrom};
pub use pipeline::{ExportSummary, MappingSummary};
pub use schema::{JoinMetadataProducer, TableMetadataProducer};
