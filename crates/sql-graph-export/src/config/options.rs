//! Import-tool options file.
//!
//! A flat JSON object with string values shared with the bulk import tool,
//! e.g. `{"delimiter": "\t", "quote": "`", "multiline-fields": "true"}`.
//! Unknown keys belong to the import tool and are ignored here.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use super::formatting::{parse_char, Formatting};
use super::types::ExportSettings;
use crate::error::{EtlError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportToolOptions {
    values: BTreeMap<String, Value>,
}

impl ImportToolOptions {
    /// Load the options file. No path means all defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path).map_err(|e| {
            EtlError::config(format!(
                "cannot read import-tool options file {}: {}",
                path.display(),
                e
            ))
        })?;
        let options = Self::from_json(&content).map_err(|e| match e {
            EtlError::InvalidConfiguration(v) => EtlError::InvalidConfiguration(
                v.into_iter()
                    .map(|m| format!("{}: {}", path.display(), m))
                    .collect(),
            ),
            other => other,
        })?;
        debug!("Loaded import-tool options from {}", path.display());
        Ok(options)
    }

    /// Parse options from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let values: BTreeMap<String, Value> = serde_json::from_str(json)
            .map_err(|e| EtlError::config(format!("malformed import-tool options: {}", e)))?;
        Ok(Self { values })
    }

    fn get_str(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            other => Some(other.to_string()),
        }
    }

    /// Delimiter: the override if given, else the options file, else `,`.
    pub fn get_delimiter(&self, override_value: Option<&str>) -> std::result::Result<char, String> {
        match override_value.map(str::to_string).or_else(|| self.get_str("delimiter")) {
            Some(v) => parse_char("delimiter", &v),
            None => Ok(Formatting::default().delimiter),
        }
    }

    /// Quote: the override if given, else the options file, else `"`.
    pub fn get_quote(&self, override_value: Option<&str>) -> std::result::Result<char, String> {
        match override_value.map(str::to_string).or_else(|| self.get_str("quote")) {
            Some(v) => parse_char("quote", &v),
            None => Ok(Formatting::default().quote),
        }
    }

    /// Multiline fields: the override if given, else the options file, else false.
    pub fn get_multiline_fields(
        &self,
        override_value: Option<bool>,
    ) -> std::result::Result<bool, String> {
        if let Some(v) = override_value {
            return Ok(v);
        }
        match self.get_str("multiline-fields") {
            None => Ok(false),
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(format!("multiline-fields must be true or false, got {:?}", v)),
            },
        }
    }

    /// Resolve the effective formatting, settings taking precedence over
    /// the options file. Every bad value is reported, as is a combination
    /// the CSV writer cannot use.
    pub fn formatting(&self, settings: &ExportSettings) -> Result<Formatting> {
        let delimiter = self.get_delimiter(settings.delimiter.as_deref());
        let quote = self.get_quote(settings.quote.as_deref());
        let multiline = self.get_multiline_fields(settings.multiline_fields);

        match (delimiter, quote, multiline) {
            (Ok(delimiter), Ok(quote), Ok(multiline_fields)) => {
                let formatting = Formatting {
                    delimiter,
                    quote,
                    multiline_fields,
                };
                let problems = formatting.problems();
                if problems.is_empty() {
                    Ok(formatting)
                } else {
                    Err(EtlError::InvalidConfiguration(problems))
                }
            }
            (d, q, m) => Err(EtlError::InvalidConfiguration(
                [d.err(), q.err(), m.err()].into_iter().flatten().collect(),
            )),
        }
    }
}
