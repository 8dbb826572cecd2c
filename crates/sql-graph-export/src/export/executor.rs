//! Streams each CSV resource from its query into a file.
//!
//! Resources run on a bounded worker pool; each worker owns one row stream
//! and one output file at a time. The first failure cancels the remaining
//! work and is returned to the caller.
//!
//! File and CSV writes are synchronous and buffered. A worker blocks its
//! runtime thread only while writing one batch, then yields before pulling
//! the next one from its row stream.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use futures::StreamExt;
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::ExportToCsvConfig;
use super::events::ExportEvent;
use super::results::{ExportToCsvResults, ExportedFile};
use crate::config::Formatting;
use crate::core::traits::RowSource;
use crate::core::value::{Row, SqlValue};
use crate::error::{EtlError, Result};
use crate::mapping::{CsvResource, FieldType};

/// Default number of rows between cancellation checks.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Exports every resource of an [`ExportToCsvConfig`] to `<destination>/<name>.csv`.
pub struct CsvExporter<S: ?Sized> {
    source: Arc<S>,
    workers: usize,
    batch_size: usize,
    cancel: CancellationToken,
    events: Option<mpsc::UnboundedSender<ExportEvent>>,
}

impl<S: RowSource + ?Sized + 'static> CsvExporter<S> {
    /// Sequential exporter (one worker).
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            workers: 1,
            batch_size: DEFAULT_BATCH_SIZE,
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    /// Maximum number of resources exported concurrently.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Rows written between cancellation checks and progress events.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<ExportEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Export all resources in configuration order.
    pub async fn execute(&self, config: &ExportToCsvConfig) -> Result<ExportToCsvResults> {
        info!(
            "Exporting from {} to CSV...",
            config.connection().database_type
        );

        // Cancelled by the caller's token or by the first failing resource
        let job = self.cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for resource in config.resources() {
            let permit = tokio::select! {
                biased;
                _ = job.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => {
                    permit.map_err(|_| EtlError::Cancelled)?
                }
            };

            let task = ResourceExport {
                source: Arc::clone(&self.source),
                path: config.destination().join(format!("{}.csv", resource.name)),
                resource: resource.clone(),
                formatting: *config.formatting(),
                batch_size: self.batch_size as u64,
                cancel: job.clone(),
                events: self.events.clone(),
            };
            let job = job.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let result = task.run().await;
                if result.is_err() {
                    job.cancel();
                }
                result
            });
        }

        let mut results = ExportToCsvResults::new();
        let mut first_error: Option<EtlError> = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|e| Err(EtlError::export("worker", e)));
            match outcome {
                Ok(file) => results.insert(file),
                Err(e) => {
                    job.cancel();
                    // A real failure wins over the cancellations it caused
                    let replace = match &first_error {
                        None => true,
                        Some(EtlError::Cancelled) => !matches!(e, EtlError::Cancelled),
                        Some(_) => false,
                    };
                    if replace {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if self.cancel.is_cancelled() {
            return Err(EtlError::Cancelled);
        }

        info!(
            "Exported {} resource(s), {} row(s)",
            results.len(),
            results.total_rows()
        );
        if let Some(events) = &self.events {
            let _ = events.send(ExportEvent::ExportCompleted {
                resources: results.len(),
                rows: results.total_rows(),
            });
        }
        Ok(results)
    }
}

/// One resource, end to end.
struct ResourceExport<S: ?Sized> {
    source: Arc<S>,
    resource: CsvResource,
    path: PathBuf,
    formatting: Formatting,
    batch_size: u64,
    cancel: CancellationToken,
    events: Option<mpsc::UnboundedSender<ExportEvent>>,
}

impl<S: RowSource + ?Sized> ResourceExport<S> {
    fn emit(&self, event: ExportEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn fail(&self, message: impl ToString) -> EtlError {
        EtlError::export(&self.resource.name, message)
    }

    async fn run(self) -> Result<ExportedFile> {
        if self.cancel.is_cancelled() {
            return Err(EtlError::Cancelled);
        }

        let name = self.resource.name.as_str();
        debug!("Exporting resource {} to {}", name, self.path.display());
        self.emit(ExportEvent::ResourceStarted {
            resource: name.to_string(),
            path: self.path.clone(),
        });

        let file = File::create(&self.path)
            .map_err(|e| self.fail(format!("cannot create {}: {}", self.path.display(), e)))?;
        let mut writer = csv_writer(&self.formatting, BufWriter::new(file));
        writer
            .write_record(self.resource.field_names())
            .map_err(|e| self.fail(e))?;

        let mut rows = self.source.query(&self.resource.sql);
        let mut positions: Vec<usize> = Vec::new();
        let mut count: u64 = 0;
        let mut multiline = false;

        while let Some(row) = rows.next().await {
            let row = row.map_err(|e| self.fail(e))?;
            if count == 0 {
                positions = resolve_positions(&self.resource, &row).map_err(|e| self.fail(e))?;
            }

            for (mapping, &pos) in self.resource.mappings.iter().zip(&positions) {
                let text = match row.get(pos) {
                    Some(value) => coerce(value, mapping.field_type).map_err(|e| {
                        self.fail(format!("column '{}': {}", mapping.column, e))
                    })?,
                    None => None,
                };
                if let Some(text) = &text {
                    multiline |= text.contains(['\n', '\r']);
                }
                writer
                    .write_field(text.as_deref().unwrap_or(""))
                    .map_err(|e| self.fail(e))?;
            }
            writer
                .write_record(None::<&[u8]>)
                .map_err(|e| self.fail(e))?;

            count += 1;
            if count % self.batch_size == 0 {
                if self.cancel.is_cancelled() {
                    warn!(
                        "Export of {} cancelled after {} rows; {} is incomplete",
                        name,
                        count,
                        self.path.display()
                    );
                    return Err(EtlError::Cancelled);
                }
                self.emit(ExportEvent::RowsWritten {
                    resource: name.to_string(),
                    rows: count,
                });
                tokio::task::yield_now().await;
            }
        }
        drop(rows);

        writer.flush().map_err(|e| self.fail(e))?;

        info!("Exported {} rows to {}", count, self.path.display());
        self.emit(ExportEvent::ResourceCompleted {
            resource: name.to_string(),
            rows: count,
            multiline,
        });

        Ok(ExportedFile {
            resource: name.to_string(),
            path: self.path.clone(),
            rows: count,
            multiline,
            graph_object_type: self.resource.graph_object_type,
            relationship_type: self.resource.relationship_type.clone(),
            integral_ids: self
                .resource
                .mappings
                .iter()
                .filter(|m| m.role.is_identifier())
                .all(|m| m.field_type.map_or(false, FieldType::is_integral)),
        })
    }
}

/// CSV writer for `formatting`: RFC 4180 quoting, `\n` record terminator.
pub fn csv_writer<W: Write>(formatting: &Formatting, inner: W) -> csv::Writer<W> {
    WriterBuilder::new()
        .delimiter(formatting.delimiter_byte())
        .quote(formatting.quote_byte())
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(inner)
}

/// Result-set position of every mapped column.
fn resolve_positions(resource: &CsvResource, row: &Row) -> std::result::Result<Vec<usize>, String> {
    resource
        .mappings
        .iter()
        .map(|m| {
            row.position(&m.column).ok_or_else(|| {
                format!(
                    "mapped column '{}' is missing from the result set [{}]",
                    m.column,
                    row.columns().join(", ")
                )
            })
        })
        .collect()
}

/// Render a value as the declared field type. NULL is `None` (an empty field).
fn coerce<'v>(
    value: &'v SqlValue<'static>,
    field_type: Option<FieldType>,
) -> std::result::Result<Option<Cow<'v, str>>, String> {
    if value.is_null() {
        return Ok(None);
    }

    match field_type {
        None | Some(FieldType::String) => Ok(value.to_csv_text()),
        Some(ty @ (FieldType::Int | FieldType::Long)) => {
            let n = match value {
                SqlValue::Text(t) => t
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| format!("'{}' is not an integer", t))?,
                SqlValue::Decimal(d) if d.fract().is_zero() => d
                    .to_i64()
                    .ok_or_else(|| format!("{} is out of range", d))?,
                other => other
                    .as_i64()
                    .ok_or_else(|| format!("{:?} is not an integer", other))?,
            };
            if ty == FieldType::Int && i32::try_from(n).is_err() {
                return Err(format!("{} is out of range for int", n));
            }
            Ok(Some(Cow::Owned(n.to_string())))
        }
        Some(FieldType::Float | FieldType::Double) => match value {
            SqlValue::F32(_)
            | SqlValue::F64(_)
            | SqlValue::Decimal(_)
            | SqlValue::I16(_)
            | SqlValue::I32(_)
            | SqlValue::I64(_) => Ok(value.to_csv_text()),
            SqlValue::Text(t) => {
                let trimmed = t.trim();
                trimmed
                    .parse::<f64>()
                    .map_err(|_| format!("'{}' is not a number", t))?;
                Ok(Some(Cow::Borrowed(trimmed)))
            }
            other => Err(format!("{:?} is not a number", other)),
        },
        Some(FieldType::Boolean) => {
            let b = match value {
                SqlValue::Bool(b) => *b,
                SqlValue::Text(t) => match t.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => true,
                    "false" | "0" => false,
                    _ => return Err(format!("'{}' is not a boolean", t)),
                },
                other => match other.as_i64() {
                    Some(0) => false,
                    Some(1) => true,
                    _ => return Err(format!("{:?} is not a boolean", other)),
                },
            };
            Ok(Some(Cow::Borrowed(if b { "true" } else { "false" })))
        }
    }
}
