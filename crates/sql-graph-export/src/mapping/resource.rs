//! CSV resources and the JSON mapping document that stores them.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::error::{EtlError, Result};

/// What a CSV file becomes in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphObjectType {
    Node,
    Relationship,
}

impl fmt::Display for GraphObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphObjectType::Node => f.write_str("Node"),
            GraphObjectType::Relationship => f.write_str("Relationship"),
        }
    }
}

/// Role of a field for the import tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldRole {
    /// Node identity.
    Id,
    /// Relationship start node identity.
    StartId,
    /// Relationship end node identity.
    EndId,
    /// Property.
    Data,
}

impl FieldRole {
    pub fn is_identifier(self) -> bool {
        !matches!(self, FieldRole::Data)
    }
}

/// Import type of a field. Values are coerced to it while exporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Int,
    Long,
    Float,
    Double,
    Boolean,
    String,
}

impl FieldType {
    /// Infer the import type from a catalog data type.
    pub fn from_sql_type(data_type: &str) -> Self {
        match data_type.to_lowercase().as_str() {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "int2" | "int4"
            | "serial" => FieldType::Int,
            "bigint" | "int8" | "bigserial" => FieldType::Long,
            "float" | "real" | "float4" => FieldType::Float,
            "double" | "double precision" | "float8" => FieldType::Double,
            "boolean" | "bool" => FieldType::Boolean,
            _ => FieldType::String,
        }
    }

    pub fn is_integral(self) -> bool {
        matches!(self, FieldType::Int | FieldType::Long)
    }
}

/// One column → field rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnToCsvFieldMapping {
    /// Result-set column label.
    pub column: String,

    /// CSV field (header) name.
    pub field: String,

    pub role: FieldRole,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
}

impl ColumnToCsvFieldMapping {
    pub fn new(
        column: impl Into<String>,
        field: impl Into<String>,
        role: FieldRole,
        field_type: Option<FieldType>,
    ) -> Self {
        Self {
            column: column.into(),
            field: field.into(),
            role,
            field_type,
        }
    }
}

/// One exportable unit; becomes `<name>.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvResource {
    pub name: String,

    #[serde(rename = "graph-object-type")]
    pub graph_object_type: GraphObjectType,

    /// Query whose select list is exactly the mapping columns.
    pub sql: String,

    pub mappings: Vec<ColumnToCsvFieldMapping>,

    #[serde(
        rename = "relationship-type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub relationship_type: Option<String>,
}

impl CsvResource {
    /// Header fields in mapping order.
    pub fn field_names(&self) -> Vec<&str> {
        self.mappings.iter().map(|m| m.field.as_str()).collect()
    }

    /// Structural problems: empty name or mappings, duplicate field names.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.name.trim().is_empty() {
            problems.push("resource name cannot be empty".to_string());
        }
        if self.mappings.is_empty() {
            problems.push(format!("resource '{}' has no mappings", self.name));
        }
        let mut seen = HashSet::new();
        for field in self.field_names() {
            if !seen.insert(field) {
                problems.push(format!(
                    "resource '{}' has duplicate field '{}'",
                    self.name, field
                ));
            }
        }
        problems
    }
}

/// Ordered collection of resources, serialized as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CsvResources(Vec<CsvResource>);

impl CsvResources {
    pub fn new(resources: Vec<CsvResource>) -> Self {
        Self(resources)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CsvResource> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&CsvResource> {
        self.0.iter().find(|r| r.name == name)
    }

    pub fn into_inner(self) -> Vec<CsvResource> {
        self.0
    }

    /// Every structural problem across the collection, including duplicate
    /// resource names.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut names = HashSet::new();
        for resource in &self.0 {
            if !names.insert(resource.name.as_str()) {
                problems.push(format!("duplicate resource name '{}'", resource.name));
            }
            problems.extend(resource.problems());
        }
        problems
    }

    /// Load a mapping document from a path or a `file://` URI, bypassing
    /// discovery.
    pub fn from_existing_file(uri: &str) -> Result<Self> {
        let path = resolve_location(uri)?;
        let content = std::fs::read_to_string(&path)
            .map_err(|e| EtlError::mapping(uri, format!("cannot read document: {}", e)))?;
        let resources = Self::from_json(&content, uri)?;
        info!("Loaded {} CSV resource(s) from {}", resources.len(), path.display());
        Ok(resources)
    }

    /// Parse and validate a mapping document.
    pub fn from_json(json: &str, location: &str) -> Result<Self> {
        let resources: Self =
            serde_json::from_str(json).map_err(|e| EtlError::mapping(location, e))?;
        let problems = resources.problems();
        if !problems.is_empty() {
            return Err(EtlError::mapping(location, problems.join("; ")));
        }
        Ok(resources)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the mapping document to a path or `file://` URI.
    pub fn save(&self, uri: &str) -> Result<PathBuf> {
        let path = resolve_location(uri)?;
        std::fs::write(&path, self.to_json()?)?;
        info!("CSV resources file: {}", path.display());
        Ok(path)
    }
}

impl<'a> IntoIterator for &'a CsvResources {
    type Item = &'a CsvResource;
    type IntoIter = std::slice::Iter<'a, CsvResource>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Turn a mapping location into a filesystem path.
fn resolve_location(uri: &str) -> Result<PathBuf> {
    if uri.starts_with("file:") {
        let url = Url::parse(uri).map_err(|e| EtlError::mapping(uri, e))?;
        return url
            .to_file_path()
            .map_err(|_| EtlError::mapping(uri, "not a local file URI"));
    }
    if let Some((scheme, _)) = uri.split_once("://") {
        return Err(EtlError::mapping(
            uri,
            format!("unsupported URI scheme '{}'", scheme),
        ));
    }
    Ok(Path::new(uri).to_path_buf())
}
