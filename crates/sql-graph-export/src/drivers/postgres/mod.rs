//! PostgreSQL database driver.
//!
//! - [`PostgresDialect`]: SQL syntax strategy
//! - [`PostgresReader`]: catalog reader and row source

mod dialect;
mod reader;

pub use dialect::PostgresDialect;
pub use reader::PostgresReader;
