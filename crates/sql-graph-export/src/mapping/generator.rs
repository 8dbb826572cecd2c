//! Generates CSV resources from discovered tables and joins.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::resource::{
    ColumnToCsvFieldMapping, CsvResource, CsvResources, FieldRole, FieldType, GraphObjectType,
};
use crate::core::metadata::{Join, JoinDirection, Table};
use crate::core::traits::Dialect;
use crate::error::{EtlError, Result};

/// Source of relationship type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipNameFrom {
    /// Upper-cased parent table name.
    #[default]
    Table,
    /// Upper-cased foreign-key column name(s).
    Column,
}

impl FromStr for RelationshipNameFrom {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(RelationshipNameFrom::Table),
            "column" => Ok(RelationshipNameFrom::Column),
            other => Err(format!(
                "relationship name source must be 'table' or 'column', got '{}'",
                other
            )),
        }
    }
}

const START_ID: &str = "start_id";
const END_ID: &str = "end_id";

/// Builds one node resource per keyed table and one relationship resource
/// per join.
pub struct CsvResourceGenerator<'a, D: ?Sized> {
    dialect: &'a D,
    relationship_name_from: RelationshipNameFrom,
}

impl<'a, D: Dialect + ?Sized> CsvResourceGenerator<'a, D> {
    pub fn new(dialect: &'a D, relationship_name_from: RelationshipNameFrom) -> Self {
        Self {
            dialect,
            relationship_name_from,
        }
    }

    pub fn generate(&self, tables: &[Table], joins: &[Join]) -> Result<CsvResources> {
        info!("Creating {} to CSV mappings...", self.dialect.name());

        let mut resources = Vec::new();
        for table in tables {
            if !table.has_pk() {
                debug!(
                    "Skipping node resource for {}: no primary key",
                    table.name()
                );
                continue;
            }
            resources.push(self.node_resource(table)?);
        }

        for join in joins {
            let child = tables
                .iter()
                .find(|t| t.name() == &join.child)
                .ok_or_else(|| {
                    EtlError::config(format!(
                        "Config is missing table definition '{}' for join [{}]",
                        join.child, join.chain()
                    ))
                })?;
            let parent = tables.iter().find(|t| t.name() == &join.parent);
            let mut resource = self.relationship_resource(child, parent, join)?;

            let taken = |name: &str| resources.iter().any(|r: &CsvResource| r.name == name);
            if taken(&resource.name) {
                resource.name = format!("{}_{}", join.child.name, join.parent.name);
            }
            if taken(&resource.name) {
                resource.name = format!("{}_{}", resource.name, join.name);
            }
            resources.push(resource);
        }

        Ok(CsvResources::new(resources))
    }

    fn node_resource(&self, table: &Table) -> Result<CsvResource> {
        let mut select = Vec::new();
        let mut mappings = Vec::new();

        let composite = table.primary_key().len() > 1;
        if composite {
            let id_field = if table.column("id").is_some() {
                format!("{}_id", table.name().name)
            } else {
                "id".to_string()
            };
            select.push(format!(
                "{} AS {}",
                self.dialect.concat_key(table.primary_key())?,
                self.dialect.quote_ident(&id_field)?
            ));
            mappings.push(ColumnToCsvFieldMapping::new(
                id_field.clone(),
                id_field,
                FieldRole::Id,
                Some(FieldType::String),
            ));
        }

        for column in table.columns() {
            select.push(self.dialect.quote_ident(&column.name)?);
            let role = if !composite && table.is_primary_key(&column.name) {
                FieldRole::Id
            } else {
                FieldRole::Data
            };
            mappings.push(ColumnToCsvFieldMapping::new(
                column.name.clone(),
                column.name.clone(),
                role,
                Some(FieldType::from_sql_type(&column.data_type)),
            ));
        }

        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            select.join(", "),
            self.dialect.qualify(table.name())?,
            self.quote_all(table.primary_key())?.join(", ")
        );

        Ok(CsvResource {
            name: table.name().name.clone(),
            graph_object_type: GraphObjectType::Node,
            sql,
            mappings,
            relationship_type: None,
        })
    }

    /// Both ends project the same key expression as the node resource they
    /// point at: a keyed child by its primary key, the parent by the foreign
    /// key in parent primary-key order.
    fn relationship_resource(
        &self,
        child: &Table,
        parent: Option<&Table>,
        join: &Join,
    ) -> Result<CsvResource> {
        let child_key: Vec<String> = if child.has_pk() {
            child.primary_key().to_vec()
        } else {
            join.start_columns.clone()
        };
        let fk_columns = parent_ordered_fk(parent, join);
        let (start, end) = match join.direction {
            JoinDirection::ChildToParent => (&child_key, &fk_columns),
            JoinDirection::ParentToChild => (&fk_columns, &child_key),
        };

        let (start_select, start_mapping) =
            self.key_projection(child, start, START_ID, FieldRole::StartId)?;
        let (end_select, end_mapping) =
            self.key_projection(child, end, END_ID, FieldRole::EndId)?;

        let not_null = self
            .quote_all(&fk_columns)?
            .into_iter()
            .map(|c| format!("{} IS NOT NULL", c))
            .collect::<Vec<_>>()
            .join(" AND ");
        let mut order_columns = child_key.clone();
        for column in &fk_columns {
            if !order_columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                order_columns.push(column.clone());
            }
        }
        let order_by = self.quote_all(&order_columns)?.join(", ");

        let sql = format!(
            "SELECT {}, {} FROM {} WHERE {} ORDER BY {}",
            start_select,
            end_select,
            self.dialect.qualify(&join.child)?,
            not_null,
            order_by
        );

        let relationship_type = match self.relationship_name_from {
            RelationshipNameFrom::Table => join.parent.name.to_uppercase(),
            RelationshipNameFrom::Column => fk_columns
                .iter()
                .map(|c| c.to_uppercase())
                .collect::<Vec<_>>()
                .join("_"),
        };

        Ok(CsvResource {
            name: join.child.name.clone(),
            graph_object_type: GraphObjectType::Relationship,
            sql,
            mappings: vec![start_mapping, end_mapping],
            relationship_type: Some(relationship_type),
        })
    }

    /// Select item and mapping for one side of a relationship. A composite
    /// key is concatenated under the field name as alias.
    fn key_projection(
        &self,
        child: &Table,
        columns: &[String],
        field: &str,
        role: FieldRole,
    ) -> Result<(String, ColumnToCsvFieldMapping)> {
        match columns {
            [single] => {
                let field_type = child
                    .column(single)
                    .map(|c| FieldType::from_sql_type(&c.data_type))
                    .unwrap_or(FieldType::String);
                Ok((
                    self.dialect.quote_ident(single)?,
                    ColumnToCsvFieldMapping::new(single.clone(), field, role, Some(field_type)),
                ))
            }
            _ => Ok((
                format!(
                    "{} AS {}",
                    self.dialect.concat_key(columns)?,
                    self.dialect.quote_ident(field)?
                ),
                ColumnToCsvFieldMapping::new(field, field, role, Some(FieldType::String)),
            )),
        }
    }

    fn quote_all(&self, columns: &[String]) -> Result<Vec<String>> {
        columns.iter().map(|c| self.dialect.quote_ident(c)).collect()
    }
}

/// Foreign-key columns of `join`, reordered to follow the parent's primary
/// key when they reference all of it. Otherwise constraint order.
fn parent_ordered_fk(parent: Option<&Table>, join: &Join) -> Vec<String> {
    let in_constraint_order = || join.keys.iter().map(|k| k.child_column.clone()).collect();

    let Some(parent) = parent.filter(|p| p.primary_key().len() == join.keys.len()) else {
        return in_constraint_order();
    };
    parent
        .primary_key()
        .iter()
        .map(|pk| {
            join.keys
                .iter()
                .find(|k| k.parent_column.eq_ignore_ascii_case(pk))
                .map(|k| k.child_column.clone())
        })
        .collect::<Option<Vec<_>>>()
        .unwrap_or_else(in_constraint_order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::{Column, JoinKey, TableName};
    use crate::drivers::MysqlDialect;

    fn student() -> Table {
        Table::new(
            TableName::new("school", "student"),
            vec![Column::new("id", "int", 1), Column::new("name", "varchar", 2)],
            vec!["id".to_string()],
        )
        .unwrap()
    }

    fn enrollment(pk: &[&str]) -> Table {
        Table::new(
            TableName::new("school", "enrollment"),
            vec![
                Column::new("student_id", "int", 1),
                Column::new("course_id", "bigint", 2),
            ],
            pk.iter().map(|c| c.to_string()).collect(),
        )
        .unwrap()
    }

    fn join() -> Join {
        Join {
            name: "fk_enrollment_student".to_string(),
            parent: TableName::new("school", "student"),
            child: TableName::new("school", "enrollment"),
            keys: vec![JoinKey {
                child_column: "student_id".to_string(),
                parent_column: "id".to_string(),
            }],
            start_columns: vec!["course_id".to_string()],
            direction: JoinDirection::ChildToParent,
        }
    }

    #[test]
    fn test_student_enrollment_resources() {
        let dialect = MysqlDialect::new();
        let resources = CsvResourceGenerator::new(&dialect, RelationshipNameFrom::Table)
            .generate(&[student(), enrollment(&[])], &[join()])
            .unwrap();

        assert_eq!(resources.len(), 2);

        let node = resources.get("student").unwrap();
        assert_eq!(node.graph_object_type, GraphObjectType::Node);
        assert_eq!(node.field_names(), vec!["id", "name"]);
        assert_eq!(node.mappings[0].role, FieldRole::Id);
        assert_eq!(node.mappings[1].role, FieldRole::Data);
        assert_eq!(
            node.sql,
            "SELECT `id`, `name` FROM `school`.`student` ORDER BY `id`"
        );

        let rel = resources.get("enrollment").unwrap();
        assert_eq!(rel.graph_object_type, GraphObjectType::Relationship);
        assert_eq!(rel.field_names(), vec!["start_id", "end_id"]);
        assert_eq!(rel.mappings[0].column, "course_id");
        assert_eq!(rel.mappings[0].field_type, Some(FieldType::Long));
        assert_eq!(rel.mappings[1].column, "student_id");
        assert_eq!(rel.relationship_type.as_deref(), Some("STUDENT"));
        assert_eq!(
            rel.sql,
            "SELECT `course_id`, `student_id` FROM `school`.`enrollment` \
             WHERE `student_id` IS NOT NULL ORDER BY `course_id`, `student_id`"
        );
    }

    #[test]
    fn test_relationship_name_from_column() {
        let dialect = MysqlDialect::new();
        let resources = CsvResourceGenerator::new(&dialect, RelationshipNameFrom::Column)
            .generate(&[student(), enrollment(&[])], &[join()])
            .unwrap();
        let rel = resources.get("enrollment").unwrap();
        assert_eq!(rel.relationship_type.as_deref(), Some("STUDENT_ID"));
        assert!(resources.to_json().unwrap().contains("STUDENT_ID"));
    }

    #[test]
    fn test_parent_to_child_swaps_ends() {
        let dialect = MysqlDialect::new();
        let mut join = join();
        join.direction = JoinDirection::ParentToChild;
        let resources = CsvResourceGenerator::new(&dialect, RelationshipNameFrom::Table)
            .generate(&[student(), enrollment(&[])], &[join])
            .unwrap();
        let rel = resources.get("enrollment").unwrap();
        assert_eq!(rel.mappings[0].column, "student_id");
        assert_eq!(rel.mappings[0].role, FieldRole::StartId);
        assert_eq!(rel.mappings[1].column, "course_id");
        assert_eq!(rel.mappings[1].role, FieldRole::EndId);
    }

    #[test]
    fn test_composite_key_node_and_name_collision() {
        let dialect = MysqlDialect::new();
        let child = enrollment(&["student_id", "course_id"]);
        let resources = CsvResourceGenerator::new(&dialect, RelationshipNameFrom::Table)
            .generate(&[student(), child], &[join()])
            .unwrap();

        let node = resources.get("enrollment").unwrap();
        assert_eq!(node.field_names(), vec!["id", "student_id", "course_id"]);
        assert_eq!(node.mappings[0].role, FieldRole::Id);
        assert_eq!(node.mappings[0].field_type, Some(FieldType::String));
        assert!(node
            .sql
            .starts_with("SELECT CONCAT_WS(':', `student_id`, `course_id`) AS `id`, "));
        assert!(node.sql.ends_with("ORDER BY `student_id`, `course_id`"));

        // The child is itself a node, so the relationship gets a compound name
        let rel = resources.get("enrollment_student").unwrap();
        assert!(resources.problems().is_empty());

        // Start ids are the child node's ids
        assert_eq!(
            rel.sql,
            "SELECT CONCAT_WS(':', `student_id`, `course_id`) AS `start_id`, `student_id` \
             FROM `school`.`enrollment` WHERE `student_id` IS NOT NULL \
             ORDER BY `student_id`, `course_id`"
        );
        assert_eq!(rel.mappings[0].field_type, node.mappings[0].field_type);
        assert_eq!(rel.mappings[1].field_type, Some(FieldType::Int));
    }

    /// Key expression of the first select item, without its alias.
    fn first_key_expression(sql: &str) -> &str {
        let items = sql.trim_start_matches("SELECT ");
        let end = items.find(" AS ").unwrap();
        &items[..end]
    }

    #[test]
    fn test_relationship_ends_match_node_ids() {
        let dialect = MysqlDialect::new();

        // Composite child key: start projection equals the child node's id projection
        let resources = CsvResourceGenerator::new(&dialect, RelationshipNameFrom::Table)
            .generate(&[student(), enrollment(&["course_id", "student_id"])], &[join()])
            .unwrap();
        let node = resources.get("enrollment").unwrap();
        let rel = resources.get("enrollment_student").unwrap();
        assert_eq!(
            first_key_expression(&rel.sql),
            first_key_expression(&node.sql)
        );
        assert_eq!(
            first_key_expression(&rel.sql),
            "CONCAT_WS(':', `course_id`, `student_id`)"
        );

        // Single-column child key: start is that key column with the node's type
        let keyed = Table::new(
            TableName::new("school", "enrollment"),
            vec![
                Column::new("enrollment_no", "int", 1),
                Column::new("student_id", "int", 2),
            ],
            vec!["enrollment_no".to_string()],
        )
        .unwrap();
        let resources = CsvResourceGenerator::new(&dialect, RelationshipNameFrom::Table)
            .generate(&[student(), keyed], &[join()])
            .unwrap();
        let node = resources.get("enrollment").unwrap();
        let rel = resources.get("enrollment_student").unwrap();
        assert_eq!(rel.mappings[0].column, node.mappings[0].column);
        assert_eq!(rel.mappings[0].field_type, node.mappings[0].field_type);
    }

    #[test]
    fn test_composite_parent_key_follows_parent_order() {
        let dialect = MysqlDialect::new();
        let course = Table::new(
            TableName::new("school", "course"),
            vec![Column::new("dept", "varchar", 1), Column::new("num", "int", 2)],
            vec!["dept".to_string(), "num".to_string()],
        )
        .unwrap();
        let section = Table::new(
            TableName::new("school", "section"),
            vec![
                Column::new("section_id", "int", 1),
                Column::new("course_num", "int", 2),
                Column::new("course_dept", "varchar", 3),
            ],
            vec!["section_id".to_string()],
        )
        .unwrap();
        // Constraint lists the key columns in the opposite order to the parent key
        let join = Join {
            name: "fk_section_course".to_string(),
            parent: TableName::new("school", "course"),
            child: TableName::new("school", "section"),
            keys: vec![
                JoinKey {
                    child_column: "course_num".to_string(),
                    parent_column: "num".to_string(),
                },
                JoinKey {
                    child_column: "course_dept".to_string(),
                    parent_column: "dept".to_string(),
                },
            ],
            start_columns: vec!["section_id".to_string()],
            direction: JoinDirection::ChildToParent,
        };

        let resources = CsvResourceGenerator::new(&dialect, RelationshipNameFrom::Column)
            .generate(&[course, section], &[join])
            .unwrap();
        let parent = resources.get("course").unwrap();
        let rel = resources.get("section_course").unwrap();

        assert!(parent
            .sql
            .starts_with("SELECT CONCAT_WS(':', `dept`, `num`) AS `id`, "));
        assert_eq!(
            rel.sql,
            "SELECT `section_id`, CONCAT_WS(':', `course_dept`, `course_num`) AS `end_id` \
             FROM `school`.`section` WHERE `course_dept` IS NOT NULL AND `course_num` IS NOT NULL \
             ORDER BY `section_id`, `course_dept`, `course_num`"
        );
        assert_eq!(rel.mappings[1].field_type, Some(FieldType::String));
        assert_eq!(rel.relationship_type.as_deref(), Some("COURSE_DEPT_COURSE_NUM"));
    }

    #[test]
    fn test_table_without_primary_key_is_not_a_node() {
        let dialect = MysqlDialect::new();
        let resources = CsvResourceGenerator::new(&dialect, RelationshipNameFrom::Table)
            .generate(&[enrollment(&[])], &[])
            .unwrap();
        assert!(resources.is_empty());
    }

    #[test]
    fn test_join_with_unknown_child() {
        let dialect = MysqlDialect::new();
        let err = CsvResourceGenerator::new(&dialect, RelationshipNameFrom::Table)
            .generate(&[student()], &[join()])
            .unwrap_err();
        assert!(err.to_string().contains("school.enrollment"));
    }

    #[test]
    fn test_parse_relationship_name_from() {
        assert_eq!("TABLE".parse::<RelationshipNameFrom>(), Ok(RelationshipNameFrom::Table));
        assert_eq!("column".parse::<RelationshipNameFrom>(), Ok(RelationshipNameFrom::Column));
        assert!("row".parse::<RelationshipNameFrom>().is_err());
    }
}
