//! Relational-column to CSV-field mappings.
//!
//! A [`CsvResource`] describes one CSV file: the SQL that produces it and
//! how each result column becomes a field. Resources are either generated
//! from discovered metadata by [`CsvResourceGenerator`] or loaded from an
//! existing JSON mapping document.

mod generator;
mod resource;

pub use generator::{CsvResourceGenerator, RelationshipNameFrom};
pub use resource::{
    ColumnToCsvFieldMapping, CsvResource, CsvResources, FieldRole, FieldType, GraphObjectType,
};
