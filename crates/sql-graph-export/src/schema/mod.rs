//! Schema discovery: tables and the joins between a parent/child pair.
//!
//! Both producers only issue read-only catalog queries through a
//! [`CatalogReader`] and return freshly created metadata.

use tracing::debug;

use crate::core::metadata::{ForeignKey, Join, JoinDirection, JoinKey, Table, TableName, TableNamePair};
use crate::core::traits::CatalogReader;
use crate::error::{EtlError, Result};

/// Discovers the columns and primary key of one table.
pub struct TableMetadataProducer<'a, C: ?Sized> {
    catalog: &'a C,
}

impl<'a, C: CatalogReader + ?Sized> TableMetadataProducer<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    /// Discover `table`. An absent table (no columns) or a failing catalog
    /// is a `SchemaDiscovery` error.
    pub async fn create_metadata_for(&self, table: &TableName) -> Result<Table> {
        let object = table.full_name();

        let columns = self
            .catalog
            .columns(table)
            .await
            .map_err(|e| EtlError::discovery(&object, e))?;
        if columns.is_empty() {
            return Err(EtlError::discovery(object, "table not found"));
        }

        let primary_key = self
            .catalog
            .primary_key(table)
            .await
            .map_err(|e| EtlError::discovery(&object, e))?;

        debug!(
            "Discovered {}: {} columns, primary key [{}]",
            object,
            columns.len(),
            primary_key.join(", ")
        );

        Table::new(table.clone(), columns, primary_key)
    }
}

/// Discovers the foreign-key joins from a child table to its parent.
pub struct JoinMetadataProducer<'a, C: ?Sized> {
    catalog: &'a C,
    direction: JoinDirection,
}

impl<'a, C: CatalogReader + ?Sized> JoinMetadataProducer<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self {
            catalog,
            direction: JoinDirection::default(),
        }
    }

    /// Direction given to every produced join.
    pub fn with_direction(mut self, direction: JoinDirection) -> Self {
        self.direction = direction;
        self
    }

    /// One `Join` per foreign-key constraint on the child referencing the
    /// parent, in constraint-name order. No foreign key yields an empty
    /// vector; either table being absent is a `SchemaDiscovery` error.
    pub async fn create_metadata_for(&self, pair: &TableNamePair) -> Result<Vec<Join>> {
        let tables = TableMetadataProducer::new(self.catalog);
        tables.create_metadata_for(pair.parent()).await?;
        let child = tables.create_metadata_for(pair.child()).await?;

        let foreign_keys = self.catalog.foreign_keys(pair).await.map_err(|e| {
            EtlError::discovery(
                format!("{} -> {}", pair.child(), pair.parent()),
                e,
            )
        })?;

        let joins = foreign_keys
            .into_iter()
            .map(|fk| self.join_for(pair, &child, fk))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Discovered {} join(s) from {} to {}",
            joins.len(),
            pair.child(),
            pair.parent()
        );
        Ok(joins)
    }

    fn join_for(&self, pair: &TableNamePair, child: &Table, fk: ForeignKey) -> Result<Join> {
        if fk.columns.is_empty() || fk.columns.len() != fk.ref_columns.len() {
            return Err(EtlError::discovery(
                &fk.name,
                format!(
                    "foreign key has {} referencing and {} referenced columns",
                    fk.columns.len(),
                    fk.ref_columns.len()
                ),
            ));
        }

        let start_columns = start_columns(child, &fk.columns)?;
        let keys = fk
            .columns
            .into_iter()
            .zip(fk.ref_columns)
            .map(|(child_column, parent_column)| JoinKey {
                child_column,
                parent_column,
            })
            .collect();

        Ok(Join {
            name: fk.name,
            parent: pair.parent().clone(),
            child: pair.child().clone(),
            keys,
            start_columns,
            direction: self.direction,
        })
    }
}

/// Child columns identifying the start side of a relationship.
///
/// A keyed child is exported as a node, so the start side is its whole
/// primary key. Without a primary key, the first column outside the
/// foreign key.
fn start_columns(child: &Table, fk_columns: &[String]) -> Result<Vec<String>> {
    if child.has_pk() {
        return Ok(child.primary_key().to_vec());
    }

    let in_fk = |name: &str| fk_columns.iter().any(|c| c.eq_ignore_ascii_case(name));
    child
        .columns()
        .iter()
        .find(|c| !in_fk(&c.name))
        .map(|c| vec![c.name.clone()])
        .ok_or_else(|| {
            EtlError::discovery(
                child.name().full_name(),
                "no column outside the foreign key can identify the relationship start",
            )
        })
}
