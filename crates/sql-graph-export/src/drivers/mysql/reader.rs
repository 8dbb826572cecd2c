//! MySQL/MariaDB catalog reader and row source.
//!
//! Uses SQLx for connection pooling and async query execution. Catalog
//! metadata comes from INFORMATION_SCHEMA; export queries are streamed with
//! a server-side cursor per resource.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::{Column as _, Row as _, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::core::metadata::{Column, ForeignKey, TableName, TableNamePair};
use crate::core::traits::{CatalogReader, RowSource, RowStream};
use crate::core::value::{Row, SqlValue};
use crate::error::Result;

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// MySQL/MariaDB reader.
pub struct MysqlReader {
    pool: MySqlPool,
}

impl MysqlReader {
    /// Connect and verify the connection with a trivial query.
    pub async fn new(config: &ConnectionConfig, max_conns: usize) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port())
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(MySqlSslMode::Preferred);

        let pool = MySqlPoolOptions::new()
            .max_connections(max_conns.max(1) as u32)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await?;

        sqlx::query("SELECT 1").fetch_one(&pool).await?;

        info!(
            "Connected to MySQL source: {}:{}/{}",
            config.host,
            config.port(),
            config.database
        );

        Ok(Self { pool })
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_values(row: &MySqlRow) -> Result<Vec<SqlValue<'static>>> {
        row.columns()
            .iter()
            .map(|col| Self::decode(row, col.ordinal(), col.type_info().name()))
            .collect()
    }

    /// Decode one cell based on the type reported in the result metadata.
    fn decode(row: &MySqlRow, idx: usize, type_name: &str) -> Result<SqlValue<'static>> {
        if row.try_get_raw(idx)?.is_null() {
            return Ok(SqlValue::Null);
        }

        let value = match type_name {
            "BOOLEAN" => SqlValue::Bool(row.try_get(idx)?),
            "TINYINT" | "SMALLINT" => SqlValue::I16(row.try_get(idx)?),
            "MEDIUMINT" | "INT" => SqlValue::I32(row.try_get(idx)?),
            "BIGINT" => SqlValue::I64(row.try_get(idx)?),
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => {
                let v: u64 = row.try_get(idx)?;
                // Values beyond i64 keep their digits as text
                i64::try_from(v)
                    .map(SqlValue::I64)
                    .unwrap_or_else(|_| SqlValue::Text(Cow::Owned(v.to_string())))
            }
            "FLOAT" => SqlValue::F32(row.try_get(idx)?),
            "DOUBLE" => SqlValue::F64(row.try_get(idx)?),
            "DECIMAL" => SqlValue::Decimal(row.try_get(idx)?),
            "DATE" => SqlValue::Date(row.try_get(idx)?),
            "TIME" => SqlValue::Time(row.try_get(idx)?),
            "DATETIME" | "TIMESTAMP" => SqlValue::DateTime(row.try_get(idx)?),
            "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
            | "GEOMETRY" => SqlValue::Bytes(Cow::Owned(row.try_get::<Vec<u8>, _>(idx)?)),
            // Character types, ENUM, SET and JSON
            _ => SqlValue::Text(Cow::Owned(row.try_get::<String, _>(idx)?)),
        };
        Ok(value)
    }
}

#[async_trait]
impl CatalogReader for MysqlReader {
    async fn columns(&self, table: &TableName) -> Result<Vec<Column>> {
        // CAST to CHAR to handle collation differences
        let query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(DATA_TYPE AS CHAR(255)) AS DATA_TYPE,
                IF(IS_NULLABLE = 'YES', 1, 0) AS is_nullable,
                CAST(ORDINAL_POSITION AS SIGNED) AS ORDINAL_POSITION
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&table.schema)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await?;

        let columns = rows
            .iter()
            .map(|row| -> Result<Column> {
                Ok(Column {
                    name: row.try_get("COLUMN_NAME")?,
                    data_type: row.try_get("DATA_TYPE")?,
                    is_nullable: row.try_get::<i64, _>("is_nullable")? == 1,
                    ordinal_pos: row.try_get::<i64, _>("ORDINAL_POSITION")? as i32,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    async fn primary_key(&self, table: &TableName) -> Result<Vec<String>> {
        // CAST to CHAR to handle collation differences
        let query = r#"
            SELECT CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME
            FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY'
            ORDER BY ORDINAL_POSITION
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&table.schema)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<String> { Ok(row.try_get("COLUMN_NAME")?) })
            .collect()
    }

    async fn foreign_keys(&self, pair: &TableNamePair) -> Result<Vec<ForeignKey>> {
        // CAST to CHAR to handle collation differences
        let query = r#"
            SELECT
                CAST(CONSTRAINT_NAME AS CHAR(255)) AS CONSTRAINT_NAME,
                CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(REFERENCED_COLUMN_NAME AS CHAR(255)) AS REFERENCED_COLUMN_NAME
            FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
                AND REFERENCED_TABLE_SCHEMA = ? AND REFERENCED_TABLE_NAME = ?
            ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION
        "#;

        let child = pair.child();
        let parent = pair.parent();
        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&child.schema)
            .bind(&child.name)
            .bind(&parent.schema)
            .bind(&parent.name)
            .fetch_all(&self.pool)
            .await?;

        // Rows arrive grouped by constraint
        let mut fks: Vec<ForeignKey> = Vec::new();
        for row in rows {
            let name: String = row.try_get("CONSTRAINT_NAME")?;
            let column: String = row.try_get("COLUMN_NAME")?;
            let ref_column: String = row.try_get("REFERENCED_COLUMN_NAME")?;

            if fks.last().map(|fk| fk.name != name).unwrap_or(true) {
                fks.push(ForeignKey {
                    name,
                    columns: Vec::new(),
                    ref_table: parent.clone(),
                    ref_columns: Vec::new(),
                });
            }
            if let Some(fk) = fks.last_mut() {
                fk.columns.push(column);
                fk.ref_columns.push(ref_column);
            }
        }

        debug!("Loaded {} foreign keys for {} -> {}", fks.len(), child, parent);
        Ok(fks)
    }

    fn db_type(&self) -> &str {
        "mysql"
    }
}

impl RowSource for MysqlReader {
    fn query<'a>(&'a self, sql: &'a str) -> RowStream<'a> {
        let mut labels: Option<Arc<[String]>> = None;
        sqlx::query(sql)
            .fetch(&self.pool)
            .map(move |row| -> Result<Row> {
                let row = row?;
                let columns = labels
                    .get_or_insert_with(|| {
                        row.columns().iter().map(|c| c.name().to_string()).collect()
                    })
                    .clone();
                Ok(Row::new(columns, Self::row_to_values(&row)?))
            })
            .boxed()
    }
}
