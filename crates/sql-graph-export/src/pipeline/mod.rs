//! End-to-end jobs behind the command-line front end.
//!
//! [`generate_mapping`] discovers a parent/child table pair and writes the
//! mapping document. [`run_export`] exports CSV files either from an existing
//! mapping document or from freshly discovered metadata, then writes the
//! graph-load configuration next to them.
//!
//! Everything that can be checked without a database (job file, formatting,
//! mapping document) is checked before connecting.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, ExportSettings, Formatting, ImportToolOptions};
use crate::core::metadata::{Join, Table, TableName, TableNamePair};
use crate::core::traits::{CatalogReader, Dialect, RowSource};
use crate::drivers::DatabaseClient;
use crate::error::{EtlError, Result};
use crate::export::{
    CsvExporter, ExportEvent, ExportToCsvConfig, ExportToCsvConfigParts, ExportedFile,
};
use crate::mapping::{CsvResourceGenerator, CsvResources};
use crate::schema::{JoinMetadataProducer, TableMetadataProducer};

/// Mapping document name used when only a destination is configured.
pub const DEFAULT_MAPPING_FILE: &str = "csv-resources.json";

/// Outcome of `generate-mapping`.
#[derive(Debug, Clone, Serialize)]
pub struct MappingSummary {
    pub mapping_file: PathBuf,
    pub tables: Vec<String>,
    pub joins: Vec<String>,
    pub resources: Vec<String>,
}

impl MappingSummary {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Outcome of `export`.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub files: Vec<ExportedFile>,
    pub rows_exported: u64,
    pub graph_config_file: PathBuf,
    pub import_tool_args: Vec<String>,
}

impl ExportSummary {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Discover the configured table pair and write its mapping document.
pub async fn generate_mapping(config: &Config) -> Result<MappingSummary> {
    config.validate()?;
    let location = mapping_location(&config.export)?;
    let pair = table_pair(config)?;

    let client = DatabaseClient::connect(&config.source, 1).await?;
    let outcome = write_mapping(&client, &pair, &config.export, &location).await;
    client.close().await;
    outcome
}

/// Export every resource to CSV and write `graph-load-config.json`.
pub async fn run_export(
    config: &Config,
    cancel: CancellationToken,
    events: Option<mpsc::UnboundedSender<ExportEvent>>,
) -> Result<ExportSummary> {
    config.validate()?;
    let settings = &config.export;

    let formatting = ImportToolOptions::load(settings.options_file.as_deref())?.formatting(settings)?;
    let preloaded = match &settings.mapping_file {
        Some(uri) => Some(CsvResources::from_existing_file(uri)?),
        None => {
            table_pair(config)?;
            None
        }
    };

    let client = Arc::new(DatabaseClient::connect(&config.source, settings.workers).await?);
    let outcome = export_from(
        Arc::clone(&client),
        config,
        formatting,
        preloaded,
        cancel,
        events,
    )
    .await;
    client.close().await;
    outcome
}

async fn write_mapping<D>(
    db: &D,
    pair: &TableNamePair,
    settings: &ExportSettings,
    location: &str,
) -> Result<MappingSummary>
where
    D: CatalogReader + Dialect + ?Sized,
{
    let (tables, joins, resources) = discover(db, pair, settings).await?;
    let mapping_file = resources.save(location)?;

    Ok(MappingSummary {
        mapping_file,
        tables: tables.iter().map(|t| t.name().full_name()).collect(),
        joins: joins.iter().map(Join::chain).collect(),
        resources: resources.iter().map(|r| r.name.clone()).collect(),
    })
}

async fn export_from<D>(
    db: Arc<D>,
    config: &Config,
    formatting: Formatting,
    preloaded: Option<CsvResources>,
    cancel: CancellationToken,
    events: Option<mpsc::UnboundedSender<ExportEvent>>,
) -> Result<ExportSummary>
where
    D: CatalogReader + RowSource + Dialect + ?Sized + 'static,
{
    let started_at = Utc::now();
    let timer = Instant::now();
    let settings = &config.export;

    let (tables, joins, resources) = match preloaded {
        Some(resources) => (Vec::new(), Vec::new(), resources),
        None => {
            let pair = table_pair(config)?;
            discover(db.as_ref(), &pair, settings).await?
        }
    };

    let export_config = ExportToCsvConfig::new(ExportToCsvConfigParts {
        destination: settings.destination.clone(),
        connection: Some(config.source.clone()),
        formatting: Some(formatting),
        tables: Some(tables),
        joins,
        resources,
    })?;

    let mut exporter = CsvExporter::new(db)
        .with_workers(settings.workers)
        .with_batch_size(settings.batch_size)
        .with_cancellation(cancel);
    if let Some(events) = events {
        exporter = exporter.with_events(events);
    }
    let results = exporter.execute(&export_config).await?;

    let graph_config = results.create_graph_config(export_config.formatting());
    let graph_config_file = graph_config.save(export_config.destination())?;

    let duration = timer.elapsed().as_secs_f64();
    info!(
        "Export completed: {} rows in {} file(s) in {:.2}s",
        results.total_rows(),
        results.len(),
        duration
    );

    Ok(ExportSummary {
        status: "completed".to_string(),
        started_at,
        completed_at: Utc::now(),
        duration_seconds: duration,
        rows_exported: results.total_rows(),
        files: results.iter().cloned().collect(),
        graph_config_file,
        import_tool_args: graph_config.import_tool_args(),
    })
}

async fn discover<D>(
    db: &D,
    pair: &TableNamePair,
    settings: &ExportSettings,
) -> Result<(Vec<Table>, Vec<Join>, CsvResources)>
where
    D: CatalogReader + Dialect + ?Sized,
{
    info!("Discovering {} and {}", pair.parent(), pair.child());
    let producer = TableMetadataProducer::new(db);
    let tables = vec![
        producer.create_metadata_for(pair.parent()).await?,
        producer.create_metadata_for(pair.child()).await?,
    ];

    let joins = JoinMetadataProducer::new(db).create_metadata_for(pair).await?;
    if joins.is_empty() {
        warn!(
            "No foreign key from {} to {}; no relationship files will be exported",
            pair.child(),
            pair.parent()
        );
    }

    let resources =
        CsvResourceGenerator::new(db, settings.relationship_name_from).generate(&tables, &joins)?;
    Ok((tables, joins, resources))
}

fn table_pair(config: &Config) -> Result<TableNamePair> {
    let settings = &config.export;
    match (&settings.parent_table, &settings.child_table) {
        (Some(parent), Some(child)) => {
            let schema = config.source.default_schema();
            TableNamePair::new(
                TableName::parse(parent, schema),
                TableName::parse(child, schema),
            )
        }
        _ => Err(EtlError::config(
            "export.parent_table and export.child_table are required when no mapping file is given",
        )),
    }
}

fn mapping_location(settings: &ExportSettings) -> Result<String> {
    match (&settings.mapping_file, &settings.destination) {
        (Some(uri), _) => Ok(uri.clone()),
        (None, Some(dir)) => Ok(dir.join(DEFAULT_MAPPING_FILE).display().to_string()),
        (None, None) => Err(EtlError::config(
            "export.mapping_file or export.destination is required to write the mapping document",
        )),
    }
}
