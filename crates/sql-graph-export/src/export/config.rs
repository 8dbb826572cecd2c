//! Validated export job configuration.

use std::path::{Path, PathBuf};

use crate::config::{ConnectionConfig, Formatting};
use crate::core::metadata::{Join, Table, TableName};
use crate::error::{EtlError, Result};
use crate::mapping::CsvResources;

/// Unvalidated ingredients of an export job.
#[derive(Debug, Clone, Default)]
pub struct ExportToCsvConfigParts {
    pub destination: Option<PathBuf>,
    pub connection: Option<ConnectionConfig>,
    pub formatting: Option<Formatting>,
    pub tables: Option<Vec<Table>>,
    pub joins: Vec<Join>,
    pub resources: CsvResources,
}

/// A complete, validated export job. It owns its collections.
#[derive(Debug, Clone)]
pub struct ExportToCsvConfig {
    destination: PathBuf,
    connection: ConnectionConfig,
    formatting: Formatting,
    tables: Vec<Table>,
    joins: Vec<Join>,
    resources: CsvResources,
}

impl ExportToCsvConfig {
    /// Validate `parts`. Fails with `InvalidConfiguration` listing every
    /// violation found.
    pub fn new(parts: ExportToCsvConfigParts) -> Result<Self> {
        let mut violations = Vec::new();

        if parts.destination.is_none() {
            violations.push("destination directory is required".to_string());
        }
        if parts.connection.is_none() {
            violations.push("connection configuration is required".to_string());
        }
        match &parts.formatting {
            None => violations.push("formatting is required".to_string()),
            Some(formatting) => violations.extend(formatting.problems()),
        }
        match &parts.tables {
            None => violations.push("table definitions are required".to_string()),
            Some(tables) => violations.extend(missing_join_tables(tables, &parts.joins)),
        }
        if parts.resources.is_empty() {
            violations.push("at least one CSV resource is required".to_string());
        }
        violations.extend(parts.resources.problems());

        match parts {
            ExportToCsvConfigParts {
                destination: Some(destination),
                connection: Some(connection),
                formatting: Some(formatting),
                tables: Some(tables),
                joins,
                resources,
            } if violations.is_empty() => Ok(Self {
                destination,
                connection,
                formatting,
                tables,
                joins,
                resources,
            }),
            _ => Err(EtlError::InvalidConfiguration(violations)),
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    pub fn formatting(&self) -> &Formatting {
        &self.formatting
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn resources(&self) -> &CsvResources {
        &self.resources
    }
}

fn missing_join_tables(tables: &[Table], joins: &[Join]) -> Vec<String> {
    let known = |name: &TableName| tables.iter().any(|t| t.name() == name);
    let mut violations = Vec::new();
    for join in joins {
        for name in join.table_names() {
            if !known(name) {
                violations.push(format!(
                    "Config is missing table definition '{}' for join [{}]",
                    name,
                    join.chain()
                ));
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseType;
    use crate::core::metadata::{Column, JoinDirection, JoinKey};
    use crate::mapping::{ColumnToCsvFieldMapping, CsvResource, FieldRole, GraphObjectType};

    fn connection() -> ConnectionConfig {
        ConnectionConfig {
            database_type: DatabaseType::Mysql,
            host: "localhost".to_string(),
            port: None,
            database: "shop".to_string(),
            user: "etl".to_string(),
            password: String::new(),
            schema: None,
        }
    }

    fn table(name: &str) -> Table {
        Table::new(
            TableName::new("shop", name),
            vec![Column::new("id", "int", 1), Column::new("customer_id", "int", 2)],
            vec!["id".to_string()],
        )
        .unwrap()
    }

    fn resource(name: &str) -> CsvResource {
        CsvResource {
            name: name.to_string(),
            graph_object_type: GraphObjectType::Node,
            sql: "SELECT `id` FROM `shop`.`customer` ORDER BY `id`".to_string(),
            mappings: vec![ColumnToCsvFieldMapping::new("id", "id", FieldRole::Id, None)],
            relationship_type: None,
        }
    }

    fn orders_join() -> Join {
        Join {
            name: "fk_orders_customer".to_string(),
            parent: TableName::new("shop", "customer"),
            child: TableName::new("shop", "orders"),
            keys: vec![JoinKey {
                child_column: "customer_id".to_string(),
                parent_column: "id".to_string(),
            }],
            start_columns: vec!["id".to_string()],
            direction: JoinDirection::ChildToParent,
        }
    }

    fn parts() -> ExportToCsvConfigParts {
        ExportToCsvConfigParts {
            destination: Some(PathBuf::from("/tmp/out")),
            connection: Some(connection()),
            formatting: Some(Formatting::default()),
            tables: Some(vec![table("customer"), table("orders")]),
            joins: vec![orders_join()],
            resources: CsvResources::new(vec![resource("customer")]),
        }
    }

    #[test]
    fn test_valid_parts() {
        let config = ExportToCsvConfig::new(parts()).unwrap();
        assert_eq!(config.destination(), Path::new("/tmp/out"));
        assert_eq!(config.tables().len(), 2);
        assert_eq!(config.joins().len(), 1);
        assert_eq!(config.resources().len(), 1);
    }

    #[test]
    fn test_join_table_missing_from_table_set() {
        let mut parts = parts();
        parts.tables = Some(vec![table("customer")]);
        let err = ExportToCsvConfig::new(parts).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(
            "Config is missing table definition 'shop.orders' for join [shop.orders -> shop.customer]"
        ));
    }

    #[test]
    fn test_every_violation_is_reported() {
        let parts = ExportToCsvConfigParts {
            formatting: Some(Formatting {
                delimiter: '"',
                ..Formatting::default()
            }),
            ..ExportToCsvConfigParts::default()
        };
        match ExportToCsvConfig::new(parts).unwrap_err() {
            EtlError::InvalidConfiguration(v) => {
                assert!(v.iter().any(|m| m.contains("destination")));
                assert!(v.iter().any(|m| m.contains("connection")));
                assert!(v.iter().any(|m| m.contains("delimiter and quote")));
                assert!(v.iter().any(|m| m.contains("table definitions")));
                assert!(v.iter().any(|m| m.contains("at least one CSV resource")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resource_problems() {
        let mut parts = parts();
        let mut dup = resource("customer");
        dup.mappings.push(ColumnToCsvFieldMapping::new("id", "id", FieldRole::Data, None));
        let mut empty = resource("empty");
        empty.mappings.clear();
        parts.resources = CsvResources::new(vec![resource("customer"), dup, empty]);

        let msg = ExportToCsvConfig::new(parts).unwrap_err().to_string();
        assert!(msg.contains("duplicate resource name 'customer'"));
        assert!(msg.contains("duplicate field 'id'"));
        assert!(msg.contains("'empty' has no mappings"));
    }

    #[test]
    fn test_empty_table_set_without_joins_is_valid() {
        let mut parts = parts();
        parts.tables = Some(Vec::new());
        parts.joins.clear();
        assert!(ExportToCsvConfig::new(parts).is_ok());
    }
}
