//! Configuration handed to the external bulk import tool.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// File name written next to the CSV files.
pub const GRAPH_CONFIG_FILE: &str = "graph-load-config.json";

/// Identifier type used by the import tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdType {
    Integer,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFile {
    pub label: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipFile {
    #[serde(rename = "type")]
    pub relationship_type: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GraphLoadConfig {
    pub nodes: Vec<NodeFile>,
    pub relationships: Vec<RelationshipFile>,
    pub id_type: IdType,
    pub delimiter: char,
    pub quote: char,
    pub multiline_fields: bool,
}

impl GraphLoadConfig {
    /// Write `graph-load-config.json` into `directory`.
    pub fn save(&self, directory: &Path) -> Result<PathBuf> {
        let path = directory.join(GRAPH_CONFIG_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        info!("Graph load configuration: {}", path.display());
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Arguments for the import tool, one per element.
    pub fn import_tool_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for node in &self.nodes {
            args.push(format!("--nodes={}={}", node.label, node.path.display()));
        }
        for rel in &self.relationships {
            args.push(format!(
                "--relationships={}={}",
                rel.relationship_type,
                rel.path.display()
            ));
        }
        let id_type = match self.id_type {
            IdType::Integer => "INTEGER",
            IdType::String => "STRING",
        };
        args.push(format!("--id-type={}", id_type));
        args.push(format!("--delimiter={}", char_arg(self.delimiter)));
        args.push(format!("--quote={}", char_arg(self.quote)));
        args.push(format!("--multiline-fields={}", self.multiline_fields));
        args
    }
}

fn char_arg(c: char) -> String {
    match c {
        '\t' => "TAB".to_string(),
        other => other.to_string(),
    }
}
