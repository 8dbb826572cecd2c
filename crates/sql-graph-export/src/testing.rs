//! In-memory database used by unit tests.
//!
//! Catalog answers come from registered tables and foreign keys. Queries are
//! answered from canned results keyed by exact SQL, falling back to the full
//! contents of the table named after `FROM`. Quoting follows MySQL.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;

use crate::core::identifier::quote_mysql;
use crate::core::metadata::{Column, ForeignKey, TableName, TableNamePair};
use crate::core::traits::{CatalogReader, Dialect, RowSource, RowStream};
use crate::core::value::{Row, SqlValue};
use crate::error::{EtlError, Result};

type Canned = (Arc<[String]>, Vec<Vec<SqlValue<'static>>>);

#[derive(Default)]
pub struct FakeDatabase {
    tables: BTreeMap<TableName, (Vec<Column>, Vec<String>)>,
    foreign_keys: Vec<(TableName, ForeignKey)>,
    data: HashMap<TableName, Vec<Vec<SqlValue<'static>>>>,
    canned: HashMap<String, Canned>,
    catalog_error: Option<String>,
    queries: AtomicUsize,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table as `(name, type)` pairs plus its primary key.
    pub fn with_table(mut self, table: TableName, columns: &[(&str, &str)], pk: &[&str]) -> Self {
        let columns = columns
            .iter()
            .enumerate()
            .map(|(i, (name, ty))| Column::new(*name, *ty, i as i32 + 1))
            .collect();
        let pk = pk.iter().map(|c| c.to_string()).collect();
        self.tables.insert(table, (columns, pk));
        self
    }

    pub fn with_foreign_key(
        mut self,
        name: &str,
        child: TableName,
        columns: &[&str],
        parent: TableName,
        ref_columns: &[&str],
    ) -> Self {
        self.foreign_keys.push((
            child,
            ForeignKey {
                name: name.to_string(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
                ref_table: parent,
                ref_columns: ref_columns.iter().map(|c| c.to_string()).collect(),
            },
        ));
        self
    }

    /// Table contents in column order.
    pub fn with_data(mut self, table: TableName, rows: Vec<Vec<SqlValue<'static>>>) -> Self {
        self.data.insert(table, rows);
        self
    }

    /// Result for one exact SQL string.
    pub fn with_result(
        mut self,
        sql: &str,
        columns: &[&str],
        rows: Vec<Vec<SqlValue<'static>>>,
    ) -> Self {
        let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
        self.canned.insert(sql.to_string(), (columns, rows));
        self
    }

    /// Make every catalog call fail.
    pub fn with_catalog_error(mut self, message: &str) -> Self {
        self.catalog_error = Some(message.to_string());
        self
    }

    /// Number of queries executed so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn check_catalog(&self) -> Result<()> {
        match &self.catalog_error {
            Some(message) => Err(EtlError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                message.clone(),
            ))),
            None => Ok(()),
        }
    }

    fn resolve(&self, sql: &str) -> Option<Canned> {
        if let Some(canned) = self.canned.get(sql) {
            return Some(canned.clone());
        }
        let (table, (columns, _)) = self.tables.iter().find(|(name, _)| {
            let qualified = format!(
                "FROM {}.{}",
                quote_mysql(&name.schema).unwrap_or_default(),
                quote_mysql(&name.name).unwrap_or_default()
            );
            sql.contains(&qualified)
        })?;
        let labels: Arc<[String]> = columns.iter().map(|c| c.name.clone()).collect();
        let rows = self.data.get(table).cloned().unwrap_or_default();
        Some((labels, rows))
    }
}

#[async_trait]
impl CatalogReader for FakeDatabase {
    async fn columns(&self, table: &TableName) -> Result<Vec<Column>> {
        self.check_catalog()?;
        Ok(self
            .tables
            .get(table)
            .map(|(columns, _)| columns.clone())
            .unwrap_or_default())
    }

    async fn primary_key(&self, table: &TableName) -> Result<Vec<String>> {
        self.check_catalog()?;
        Ok(self
            .tables
            .get(table)
            .map(|(_, pk)| pk.clone())
            .unwrap_or_default())
    }

    async fn foreign_keys(&self, pair: &TableNamePair) -> Result<Vec<ForeignKey>> {
        self.check_catalog()?;
        Ok(self
            .foreign_keys
            .iter()
            .filter(|(child, fk)| child == pair.child() && &fk.ref_table == pair.parent())
            .map(|(_, fk)| fk.clone())
            .collect())
    }

    fn db_type(&self) -> &str {
        "fake"
    }
}

impl RowSource for FakeDatabase {
    fn query<'a>(&'a self, sql: &'a str) -> RowStream<'a> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match self.resolve(sql) {
            Some((columns, rows)) => stream::iter(
                rows.into_iter()
                    .map(move |values| Ok(Row::new(columns.clone(), values))),
            )
            .boxed(),
            None => stream::once(async move {
                Err(EtlError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no result registered for query: {}", sql),
                )))
            })
            .boxed(),
        }
    }
}

impl Dialect for FakeDatabase {
    fn name(&self) -> &str {
        "fake"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_mysql(name)
    }
}

/// `student(id, name)` and `enrollment(student_id, course_id)` joined on
/// `enrollment.student_id = student.id`.
pub fn school() -> FakeDatabase {
    let student = TableName::new("school", "student");
    let enrollment = TableName::new("school", "enrollment");
    FakeDatabase::new()
        .with_table(student.clone(), &[("id", "int"), ("name", "varchar")], &["id"])
        .with_table(
            enrollment.clone(),
            &[("student_id", "int"), ("course_id", "int")],
            &[],
        )
        .with_foreign_key(
            "fk_enrollment_student",
            enrollment.clone(),
            &["student_id"],
            student.clone(),
            &["id"],
        )
        .with_data(
            student,
            vec![
                vec![SqlValue::I32(1), SqlValue::from("Ada".to_string())],
                vec![SqlValue::I32(2), SqlValue::from("Grace".to_string())],
            ],
        )
        .with_data(
            enrollment,
            vec![
                vec![SqlValue::I32(1), SqlValue::I32(101)],
                vec![SqlValue::I32(2), SqlValue::I32(101)],
                vec![SqlValue::I32(2), SqlValue::I32(102)],
            ],
        )
}
