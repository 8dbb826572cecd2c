//! Core abstractions shared by drivers, discovery and export.

pub mod identifier;
pub mod metadata;
pub mod traits;
pub mod value;

pub use metadata::{
    Column, ForeignKey, Join, JoinDirection, JoinKey, Table, TableName, TableNamePair,
};
pub use traits::{CatalogReader, Dialect, RowSource, RowStream, KEY_SEPARATOR};
pub use value::{Row, SqlValue};
