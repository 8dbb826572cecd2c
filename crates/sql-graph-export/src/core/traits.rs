//! Core traits for engine-agnostic schema discovery and export.
//!
//! - [`CatalogReader`]: reads column, key and constraint metadata
//! - [`RowSource`]: executes a query and streams its rows
//! - [`Dialect`]: SQL syntax strategy for a database engine
//!
//! Drivers implement all three; tests use an in-memory fake.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

use super::metadata::{Column, ForeignKey, TableName, TableNamePair};
use super::value::Row;

/// Stream of rows produced by one query. Dropping it releases the cursor.
pub type RowStream<'a> = BoxStream<'a, Result<Row>>;

/// Read catalog metadata from the source database.
///
/// Implementations must only issue read-only catalog queries.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Columns of a table ordered by ordinal position. An absent table
    /// yields an empty vector.
    async fn columns(&self, table: &TableName) -> Result<Vec<Column>>;

    /// Primary key column names in key order. Empty when there is no key.
    async fn primary_key(&self, table: &TableName) -> Result<Vec<String>>;

    /// Foreign keys declared on the child of `pair` that reference its parent,
    /// with columns in constraint ordinal order.
    async fn foreign_keys(&self, pair: &TableNamePair) -> Result<Vec<ForeignKey>>;

    /// Get the database type identifier (e.g., "mysql", "postgres").
    fn db_type(&self) -> &str;
}

/// Execute SQL and iterate the resulting rows.
pub trait RowSource: Send + Sync {
    /// Run `sql` and stream its rows in result order.
    fn query<'a>(&'a self, sql: &'a str) -> RowStream<'a>;
}

/// SQL syntax strategy for generated export queries.
pub trait Dialect: Send + Sync {
    /// Dialect name (e.g., "mysql", "postgres").
    fn name(&self) -> &str;

    /// Quote an identifier.
    fn quote_ident(&self, name: &str) -> Result<String>;

    /// Schema-qualified, quoted table reference.
    fn qualify(&self, table: &TableName) -> Result<String> {
        Ok(format!(
            "{}.{}",
            self.quote_ident(&table.schema)?,
            self.quote_ident(&table.name)?
        ))
    }

    /// Expression concatenating several key columns into one identifier.
    fn concat_key(&self, columns: &[String]) -> Result<String> {
        let quoted = columns
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("CONCAT_WS('{}', {})", KEY_SEPARATOR, quoted.join(", ")))
    }
}

/// Separator placed between the parts of a composite key.
pub const KEY_SEPARATOR: &str = ":";
