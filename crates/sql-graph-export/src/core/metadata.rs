//! Schema metadata types: table names, columns, tables and joins.
//!
//! These are immutable value types produced by the metadata producers and
//! consumed by the mapping generator and the export configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EtlError, Result};

/// Fully qualified relational table identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableName {
    /// Schema (MySQL database) name.
    pub schema: String,

    /// Table name.
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parse `schema.table`, falling back to `default_schema` for a bare name.
    pub fn parse(value: &str, default_schema: &str) -> Self {
        match value.split_once('.') {
            Some((schema, name)) if !schema.is_empty() && !name.is_empty() => {
                Self::new(schema, name)
            }
            _ => Self::new(default_schema, value),
        }
    }

    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Data type as reported by the catalog (e.g., "int", "varchar").
    pub data_type: String,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Ordinal position (1-based).
    pub ordinal_pos: i32,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, ordinal_pos: i32) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
            ordinal_pos,
        }
    }

    /// Check if the column holds an integral number.
    pub fn is_integral(&self) -> bool {
        matches!(
            self.data_type.to_lowercase().as_str(),
            "tinyint"
                | "smallint"
                | "mediumint"
                | "int"
                | "integer"
                | "bigint"
                | "int2"
                | "int4"
                | "int8"
                | "serial"
                | "bigserial"
        )
    }
}

/// Discovered schema for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    name: TableName,
    columns: Vec<Column>,
    primary_key: Vec<String>,
}

impl Table {
    /// Create a table, checking that it has columns and that every primary
    /// key column is one of them.
    pub fn new(name: TableName, columns: Vec<Column>, primary_key: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(EtlError::discovery(name.full_name(), "table has no columns"));
        }
        if let Some(missing) = primary_key
            .iter()
            .find(|pk| !columns.iter().any(|c| &c.name == *pk))
        {
            return Err(EtlError::discovery(
                name.full_name(),
                format!("primary key column '{}' is not a column of the table", missing),
            ));
        }
        Ok(Self {
            name,
            columns,
            primary_key,
        })
    }

    pub fn name(&self) -> &TableName {
        &self.name
    }

    /// Columns in ordinal order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Primary key column names in key order.
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Find a column by name (case-insensitive, as catalogs differ).
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key.iter().any(|pk| pk.eq_ignore_ascii_case(column))
    }
}

/// Ordered (parent, child) table reference used for join discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableNamePair {
    parent: TableName,
    child: TableName,
}

impl TableNamePair {
    pub fn new(parent: TableName, child: TableName) -> Result<Self> {
        if parent == child {
            return Err(EtlError::config(format!(
                "parent and child table must differ (both are '{}')",
                parent.full_name()
            )));
        }
        Ok(Self { parent, child })
    }

    pub fn parent(&self) -> &TableName {
        &self.parent
    }

    pub fn child(&self) -> &TableName {
        &self.child
    }
}

/// Foreign key constraint as read from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,

    /// Referencing (child) column names, in constraint order.
    pub columns: Vec<String>,

    /// Referenced (parent) table.
    pub ref_table: TableName,

    /// Referenced column names, in constraint order.
    pub ref_columns: Vec<String>,
}

/// One column pair connecting child and parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinKey {
    /// Referencing column in the child table.
    pub child_column: String,

    /// Referenced column in the parent table.
    pub parent_column: String,
}

/// Direction of the relationship derived from a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinDirection {
    /// Child row → referenced parent row (foreign key direction).
    #[default]
    ChildToParent,

    /// Referenced parent row → child row.
    ParentToChild,
}

/// A discovered or declared relationship between two tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    /// Constraint name (or a declared name).
    pub name: String,

    /// Referenced table.
    pub parent: TableName,

    /// Referencing table.
    pub child: TableName,

    /// Key pairs in constraint order.
    pub keys: Vec<JoinKey>,

    /// Child columns identifying the child side of the relationship.
    pub start_columns: Vec<String>,

    #[serde(default)]
    pub direction: JoinDirection,
}

impl Join {
    /// Tables taking part in the join, child first.
    pub fn table_names(&self) -> [&TableName; 2] {
        [&self.child, &self.parent]
    }

    /// Child columns holding the foreign key.
    pub fn child_columns(&self) -> Vec<&str> {
        self.keys.iter().map(|k| k.child_column.as_str()).collect()
    }

    /// Render the join chain, e.g. `db.enrollment -> db.student`.
    pub fn chain(&self) -> String {
        self.table_names()
            .iter()
            .map(|t| t.full_name())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str, pos: i32) -> Column {
        Column::new(name, data_type, pos)
    }

    #[test]
    fn test_table_name_parse() {
        assert_eq!(
            TableName::parse("school.student", "other"),
            TableName::new("school", "student")
        );
        assert_eq!(
            TableName::parse("student", "school"),
            TableName::new("school", "student")
        );
        assert_eq!(TableName::new("a", "b").to_string(), "a.b");
    }

    #[test]
    fn test_table_requires_columns() {
        let err = Table::new(TableName::new("s", "t"), vec![], vec![]).unwrap_err();
        assert!(matches!(err, EtlError::SchemaDiscovery { .. }));
    }

    #[test]
    fn test_table_primary_key_subset_of_columns() {
        let err = Table::new(
            TableName::new("s", "t"),
            vec![column("id", "int", 1)],
            vec!["missing".to_string()],
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing"));

        let table = Table::new(
            TableName::new("s", "t"),
            vec![column("id", "int", 1), column("name", "varchar", 2)],
            vec!["id".to_string()],
        )
        .unwrap();
        assert!(table.has_pk());
        assert!(table.is_primary_key("ID"));
        assert_eq!(table.column("NAME").map(|c| c.ordinal_pos), Some(2));
    }

    #[test]
    fn test_table_name_pair_rejects_same_table() {
        let t = TableName::new("s", "t");
        assert!(TableNamePair::new(t.clone(), t).is_err());
    }

    #[test]
    fn test_column_is_integral() {
        assert!(column("id", "BIGINT", 1).is_integral());
        assert!(column("id", "int4", 1).is_integral());
        assert!(!column("id", "varchar", 1).is_integral());
    }

    #[test]
    fn test_join_chain() {
        let join = Join {
            name: "fk_student".to_string(),
            parent: TableName::new("school", "student"),
            child: TableName::new("school", "enrollment"),
            keys: vec![JoinKey {
                child_column: "student_id".to_string(),
                parent_column: "id".to_string(),
            }],
            start_columns: vec!["course_id".to_string()],
            direction: JoinDirection::ChildToParent,
        };
        assert_eq!(join.chain(), "school.enrollment -> school.student");
        assert_eq!(join.child_columns(), vec!["student_id"]);
    }
}
