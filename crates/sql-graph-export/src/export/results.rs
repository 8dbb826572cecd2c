//! Outcome of an export job.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

use crate::config::Formatting;
use crate::graph::{GraphLoadConfig, IdType, NodeFile, RelationshipFile};
use crate::mapping::GraphObjectType;

/// One written CSV file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedFile {
    pub resource: String,
    pub path: PathBuf,
    pub rows: u64,

    /// A field value contained a line break.
    pub multiline: bool,

    pub graph_object_type: GraphObjectType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<String>,

    /// Every identifier field is declared as int or long.
    pub integral_ids: bool,
}

/// Exported files keyed by resource name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportToCsvResults {
    files: BTreeMap<String, ExportedFile>,
}

impl ExportToCsvResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: ExportedFile) {
        self.files.insert(file.resource.clone(), file);
    }

    pub fn get(&self, resource: &str) -> Option<&ExportedFile> {
        self.files.get(resource)
    }

    /// Files in resource-name order.
    pub fn iter(&self) -> impl Iterator<Item = &ExportedFile> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_rows(&self) -> u64 {
        self.files.values().map(|f| f.rows).sum()
    }

    /// Derive the import-tool configuration for these files.
    ///
    /// Multiline fields are enabled whenever any file contains one, even
    /// if the configured formatting disabled them.
    pub fn create_graph_config(&self, formatting: &Formatting) -> GraphLoadConfig {
        let mut nodes = Vec::new();
        let mut relationships = Vec::new();
        for file in self.files.values() {
            match file.graph_object_type {
                GraphObjectType::Node => nodes.push(NodeFile {
                    label: file.resource.clone(),
                    path: file.path.clone(),
                }),
                GraphObjectType::Relationship => relationships.push(RelationshipFile {
                    relationship_type: file
                        .relationship_type
                        .clone()
                        .unwrap_or_else(|| file.resource.to_uppercase()),
                    path: file.path.clone(),
                }),
            }
        }

        let id_type = if self.files.values().all(|f| f.integral_ids) {
            IdType::Integer
        } else {
            IdType::String
        };

        let has_multiline = self.files.values().any(|f| f.multiline);
        if has_multiline && !formatting.multiline_fields {
            let names: Vec<&str> = self
                .files
                .values()
                .filter(|f| f.multiline)
                .map(|f| f.resource.as_str())
                .collect();
            warn!(
                "Multiline fields were disabled but found in [{}]; enabling multiline-fields",
                names.join(", ")
            );
        }

        GraphLoadConfig {
            nodes,
            relationships,
            id_type,
            delimiter: formatting.delimiter,
            quote: formatting.quote,
            multiline_fields: formatting.multiline_fields || has_multiline,
        }
    }
}
