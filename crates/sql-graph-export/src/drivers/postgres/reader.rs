//! PostgreSQL catalog reader and row source.
//!
//! Catalog metadata is read from `information_schema` and `pg_catalog`.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{Column as _, Row as _, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::core::metadata::{Column, ForeignKey, TableName, TableNamePair};
use crate::core::traits::{CatalogReader, RowSource, RowStream};
use crate::core::value::{Row, SqlValue};
use crate::error::Result;

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL reader.
pub struct PostgresReader {
    pool: PgPool,
}

impl PostgresReader {
    /// Connect and verify the connection with a trivial query.
    pub async fn new(config: &ConnectionConfig, max_conns: usize) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port())
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(PgSslMode::Prefer);

        let pool = PgPoolOptions::new()
            .max_connections(max_conns.max(1) as u32)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await?;

        sqlx::query("SELECT 1").fetch_one(&pool).await?;

        info!(
            "Connected to PostgreSQL source: {}:{}/{}",
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

    fn row_to_values(row: &PgRow) -> Result<Vec<SqlValue<'static>>> {
        row.columns()
            .iter()
            .map(|col| Self::decode(row, col.ordinal(), col.type_info().name()))
            .collect()
    }

    fn decode(row: &PgRow, idx: usize, type_name: &str) -> Result<SqlValue<'static>> {
        if row.try_get_raw(idx)?.is_null() {
            return Ok(SqlValue::Null);
        }

        let value = match type_name {
            "BOOL" => SqlValue::Bool(row.try_get(idx)?),
            "INT2" => SqlValue::I16(row.try_get(idx)?),
            "INT4" => SqlValue::I32(row.try_get(idx)?),
            "INT8" => SqlValue::I64(row.try_get(idx)?),
            "FLOAT4" => SqlValue::F32(row.try_get(idx)?),
            "FLOAT8" => SqlValue::F64(row.try_get(idx)?),
            "NUMERIC" => SqlValue::Decimal(row.try_get(idx)?),
            "UUID" => SqlValue::Uuid(row.try_get(idx)?),
            "BYTEA" => SqlValue::Bytes(Cow::Owned(row.try_get::<Vec<u8>, _>(idx)?)),
            "DATE" => SqlValue::Date(row.try_get(idx)?),
            "TIME" => SqlValue::Time(row.try_get(idx)?),
            "TIMESTAMP" => SqlValue::DateTime(row.try_get(idx)?),
            "TIMESTAMPTZ" => SqlValue::DateTimeOffset(
                row.try_get::<chrono::DateTime<chrono::Utc>, _>(idx)?
                    .fixed_offset(),
            ),
            // TEXT, VARCHAR, BPCHAR, NAME and friends
            _ => SqlValue::Text(Cow::Owned(row.try_get::<String, _>(idx)?)),
        };
        Ok(value)
    }
}

#[async_trait]
impl CatalogReader for PostgresReader {
    async fn columns(&self, table: &TableName) -> Result<Vec<Column>> {
        let query = r#"
            SELECT
                column_name::text AS column_name,
                data_type::text AS data_type,
                is_nullable = 'YES' AS is_nullable,
                ordinal_position::int4 AS ordinal_position
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let rows: Vec<PgRow> = sqlx::query(query)
            .bind(&table.schema)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await?;

        let columns = rows
            .iter()
            .map(|row| -> Result<Column> {
                Ok(Column {
                    name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
                    is_nullable: row.try_get("is_nullable")?,
                    ordinal_pos: row.try_get("ordinal_position")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    async fn primary_key(&self, table: &TableName) -> Result<Vec<String>> {
        let query = r#"
            SELECT a.attname::text AS column_name
            FROM pg_index i
            JOIN pg_class c ON c.oid = i.indrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            JOIN LATERAL unnest(i.indkey) WITH ORDINALITY AS k(attnum, ord) ON true
            JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
            WHERE i.indisprimary AND n.nspname = $1 AND c.relname = $2
            ORDER BY k.ord
        "#;

        let rows: Vec<PgRow> = sqlx::query(query)
            .bind(&table.schema)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<String> { Ok(row.try_get("column_name")?) })
            .collect()
    }

    async fn foreign_keys(&self, pair: &TableNamePair) -> Result<Vec<ForeignKey>> {
        let query = r#"
            SELECT
                con.conname::text AS constraint_name,
                ca.attname::text AS column_name,
                pa.attname::text AS ref_column_name
            FROM pg_constraint con
            JOIN pg_class c ON c.oid = con.conrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            JOIN pg_class pc ON pc.oid = con.confrelid
            JOIN pg_namespace pn ON pn.oid = pc.relnamespace
            JOIN LATERAL unnest(con.conkey, con.confkey)
                WITH ORDINALITY AS k(attnum, ref_attnum, ord) ON true
            JOIN pg_attribute ca ON ca.attrelid = con.conrelid AND ca.attnum = k.attnum
            JOIN pg_attribute pa ON pa.attrelid = con.confrelid AND pa.attnum = k.ref_attnum
            WHERE con.contype = 'f'
                AND n.nspname = $1 AND c.relname = $2
                AND pn.nspname = $3 AND pc.relname = $4
            ORDER BY con.conname, k.ord
        "#;

        let child = pair.child();
        let parent = pair.parent();
        let rows: Vec<PgRow> = sqlx::query(query)
            .bind(&child.schema)
            .bind(&child.name)
            .bind(&parent.schema)
            .bind(&parent.name)
            .fetch_all(&self.pool)
            .await?;

        // Rows arrive grouped by constraint
        let mut fks: Vec<ForeignKey> = Vec::new();
        for row in rows {
            let name: String = row.try_get("constraint_name")?;
            let column: String = row.try_get("column_name")?;
            let ref_column: String = row.try_get("ref_column_name")?;

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
        "postgres"
    }
}

impl RowSource for PostgresReader {
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
