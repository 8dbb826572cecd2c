//! CSV formatting shared by the export executor and the graph-load config.

use serde::{Deserialize, Serialize};

/// Delimiter, quote character and multiline handling of the CSV files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formatting {
    pub delimiter: char,
    pub quote: char,
    #[serde(rename = "multiline-fields")]
    pub multiline_fields: bool,
}

impl Default for Formatting {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote: '"',
            multiline_fields: false,
        }
    }
}

impl Formatting {
    /// Every reason this formatting cannot produce parseable CSV.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (key, c) in [("delimiter", self.delimiter), ("quote", self.quote)] {
            if !c.is_ascii() {
                problems.push(format!("formatting {} must be an ASCII character, got {:?}", key, c));
            }
            if c == '\n' || c == '\r' {
                problems.push(format!("formatting {} cannot be a line break", key));
            }
        }
        if self.delimiter == self.quote {
            problems.push(format!(
                "formatting delimiter and quote must differ (both are {:?})",
                self.delimiter
            ));
        }
        problems
    }

    /// Delimiter as a byte. Only meaningful once `problems()` is empty.
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }

    /// Quote as a byte. Only meaningful once `problems()` is empty.
    pub fn quote_byte(&self) -> u8 {
        self.quote as u8
    }
}

/// Parse a single formatting character. `TAB` and the escape `\t` both
/// mean a tab.
pub fn parse_char(key: &str, value: &str) -> std::result::Result<char, String> {
    if value.eq_ignore_ascii_case("TAB") || value == "\\t" {
        return Ok('\t');
    }
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("{} must be a single character, got {:?}", key, value)),
    }
}
