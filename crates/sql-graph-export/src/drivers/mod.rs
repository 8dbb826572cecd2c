//! Database driver implementations.
//!
//! Each driver module implements the core traits for one engine:
//!
//! - [`mysql`]: MySQL/MariaDB driver
//! - [`postgres`]: PostgreSQL driver
//!
//! [`DatabaseClient`] dispatches to the configured engine with a plain
//! enum, so callers work with one concrete type instead of `Box<dyn Trait>`.

pub mod mysql;
pub mod postgres;

pub use mysql::{MysqlDialect, MysqlReader};
pub use postgres::{PostgresDialect, PostgresReader};

use async_trait::async_trait;

use crate::config::{ConnectionConfig, DatabaseType};
use crate::core::metadata::{Column, ForeignKey, TableName, TableNamePair};
use crate::core::traits::{CatalogReader, Dialect, RowSource, RowStream};
use crate::error::Result;

/// Enum-based static dispatch for the supported engines.
pub enum DatabaseClient {
    Mysql(MysqlReader, MysqlDialect),
    Postgres(PostgresReader, PostgresDialect),
}

impl DatabaseClient {
    /// Connect to the configured source with a pool of `max_conns`
    /// connections (at least one).
    pub async fn connect(config: &ConnectionConfig, max_conns: usize) -> Result<Self> {
        match config.database_type {
            DatabaseType::Mysql => Ok(DatabaseClient::Mysql(
                MysqlReader::new(config, max_conns).await?,
                MysqlDialect::new(),
            )),
            DatabaseType::Postgres => Ok(DatabaseClient::Postgres(
                PostgresReader::new(config, max_conns).await?,
                PostgresDialect::new(),
            )),
        }
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        match self {
            DatabaseClient::Mysql(r, _) => r.close().await,
            DatabaseClient::Postgres(r, _) => r.close().await,
        }
    }
}

#[async_trait]
impl CatalogReader for DatabaseClient {
    async fn columns(&self, table: &TableName) -> Result<Vec<Column>> {
        match self {
            DatabaseClient::Mysql(r, _) => r.columns(table).await,
            DatabaseClient::Postgres(r, _) => r.columns(table).await,
        }
    }

    async fn primary_key(&self, table: &TableName) -> Result<Vec<String>> {
        match self {
            DatabaseClient::Mysql(r, _) => r.primary_key(table).await,
            DatabaseClient::Postgres(r, _) => r.primary_key(table).await,
        }
    }

    async fn foreign_keys(&self, pair: &TableNamePair) -> Result<Vec<ForeignKey>> {
        match self {
            DatabaseClient::Mysql(r, _) => r.foreign_keys(pair).await,
            DatabaseClient::Postgres(r, _) => r.foreign_keys(pair).await,
        }
    }

    fn db_type(&self) -> &str {
        match self {
            DatabaseClient::Mysql(r, _) => r.db_type(),
            DatabaseClient::Postgres(r, _) => r.db_type(),
        }
    }
}

impl RowSource for DatabaseClient {
    fn query<'a>(&'a self, sql: &'a str) -> RowStream<'a> {
        match self {
            DatabaseClient::Mysql(r, _) => r.query(sql),
            DatabaseClient::Postgres(r, _) => r.query(sql),
        }
    }
}

impl Dialect for DatabaseClient {
    fn name(&self) -> &str {
        match self {
            DatabaseClient::Mysql(_, d) => d.name(),
            DatabaseClient::Postgres(_, d) => d.name(),
        }
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        match self {
            DatabaseClient::Mysql(_, d) => d.quote_ident(name),
            DatabaseClient::Postgres(_, d) => d.quote_ident(name),
        }
    }
}
