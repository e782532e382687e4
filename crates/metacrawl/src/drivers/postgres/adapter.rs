//! PostgreSQL metadata adapter.
//!
//! Scoped to the `public` schema. Catalog columns are cast to `text`/`int8`
//! in SQL because `information_schema` uses domain types tokio-postgres
//! won't decode directly.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info};

use crate::config::DataSourceDescriptor;
use crate::core::identifier::qualify_ansi;
use crate::core::{ColumnSnapshot, DialectAdapter, DialectKind, RelationshipEdge, TableInfo};
use crate::drivers::common::types::{render_postgres, RawColumnType};
use crate::drivers::common::{non_empty, postgres_tls};
use crate::error::{CrawlError, Result};

const SCHEMA: &str = "public";

/// PostgreSQL metadata adapter.
pub struct PostgresAdapter {
    pool: Pool,
}

impl PostgresAdapter {
    /// Connect and verify the connection with `SELECT 1`.
    pub async fn connect(ds: &DataSourceDescriptor, connect_timeout: Duration) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&ds.host);
        pg_config.port(ds.port());
        pg_config.dbname(&ds.database);
        pg_config.user(&ds.username);
        pg_config.password(&ds.password);
        pg_config.connect_timeout(connect_timeout);
        pg_config.application_name("metacrawl");

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = match postgres_tls(&ds.ssl_mode)? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => {
                debug!("PostgreSQL TLS disabled for {}", ds.name);
                Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
            }
        };

        let pool = Pool::builder(mgr)
            .max_size(1)
            .build()
            .map_err(|e| CrawlError::pool(e.to_string(), "creating PostgreSQL source pool"))?;

        let client = pool
            .get()
            .await
            .map_err(|e| CrawlError::connection(&ds.name, e.to_string()))?;
        client
            .simple_query(ds.kind.probe_query())
            .await
            .map_err(|e| CrawlError::connection(&ds.name, e.to_string()))?;
        drop(client);

        info!("Connected to PostgreSQL source: {}", ds.endpoint());

        Ok(Self { pool })
    }

    async fn client(&self, context: &str) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| CrawlError::pool(e.to_string(), context.to_string()))
    }
}

#[async_trait]
impl DialectAdapter for PostgresAdapter {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgresql
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let client = self.client("listing tables").await?;
        let rows = client
            .query(
                "SELECT tablename::text FROM pg_tables WHERE schemaname = $1 ORDER BY tablename",
                &[&SCHEMA],
            )
            .await?;
        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    async fn table_metadata(&self, table: &str) -> Result<TableInfo> {
        let client = self.client("loading table comment").await?;
        let row = client
            .query_opt(
                r#"
                SELECT obj_description(c.oid, 'pg_class')
                FROM pg_class c
                JOIN pg_namespace n ON c.relnamespace = n.oid
                WHERE c.relname = $1 AND n.nspname = $2
                "#,
                &[&table, &SCHEMA],
            )
            .await?;

        Ok(TableInfo {
            schema_name: SCHEMA.to_string(),
            comment: non_empty(row.and_then(|r| r.get::<_, Option<String>>(0))),
        })
    }

    async fn column_metadata(&self, table: &str) -> Result<Vec<ColumnSnapshot>> {
        let client = self.client("loading columns").await?;
        let rows = client
            .query(
                r#"
                SELECT
                    c.column_name::text,
                    c.data_type::text,
                    c.character_maximum_length::int8,
                    c.numeric_precision::int8,
                    c.numeric_scale::int8,
                    c.is_nullable::text = 'YES',
                    c.column_default::text,
                    c.ordinal_position::int4,
                    col_description(pc.oid, c.ordinal_position::int4)
                FROM information_schema.columns c
                JOIN pg_namespace n ON n.nspname = c.table_schema
                JOIN pg_class pc ON pc.relname = c.table_name AND pc.relnamespace = n.oid
                WHERE c.table_name = $1 AND c.table_schema = $2
                ORDER BY c.ordinal_position
                "#,
                &[&table, &SCHEMA],
            )
            .await?;

        let columns = rows
            .iter()
            .map(|row| {
                let raw = RawColumnType {
                    data_type: row.get(1),
                    char_length: row.get(2),
                    data_length: None,
                    numeric_precision: row.get(3),
                    numeric_scale: row.get(4),
                    datetime_precision: None,
                };
                ColumnSnapshot {
                    column_name: row.get(0),
                    data_type: render_postgres(&raw),
                    is_nullable: row.get(5),
                    default_value: row.get(6),
                    ordinal_position: row.get(7),
                    comment: non_empty(row.get(8)),
                }
            })
            .collect();
        Ok(columns)
    }

    async fn relationships(&self) -> Result<Vec<RelationshipEdge>> {
        let client = self.client("loading foreign keys").await?;
        let rows = client
            .query(
                r#"
                SELECT
                    tc.constraint_name::text,
                    tc.table_name::text,
                    kcu.column_name::text,
                    ccu.table_name::text AS referenced_table_name,
                    ccu.column_name::text AS referenced_column_name
                FROM information_schema.table_constraints tc
                JOIN information_schema.key_column_usage kcu
                  ON tc.constraint_name = kcu.constraint_name
                 AND tc.table_schema = kcu.table_schema
                JOIN information_schema.constraint_column_usage ccu
                  ON ccu.constraint_name = tc.constraint_name
                 AND ccu.table_schema = tc.table_schema
                WHERE tc.constraint_type = 'FOREIGN KEY'
                  AND tc.table_schema = $1
                "#,
                &[&SCHEMA],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                RelationshipEdge::foreign_key(
                    row.get::<_, String>(0),
                    row.get::<_, String>(1),
                    row.get::<_, String>(2),
                    row.get::<_, String>(3),
                    row.get::<_, String>(4),
                )
            })
            .collect())
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        let client = self.client("counting rows").await?;
        let query = format!("SELECT COUNT(*) FROM {}", qualify_ansi(SCHEMA, table)?);
        let row = client.query_one(&query, &[]).await?;
        Ok(row.get::<_, i64>(0))
    }

    async fn measure_size(&self, table: &str) -> Result<i64> {
        let client = self.client("measuring table size").await?;
        let row = client
            .query_one(
                "SELECT pg_total_relation_size(format('%I.%I', $1::text, $2::text)::regclass)",
                &[&SCHEMA, &table],
            )
            .await?;
        Ok(row.get::<_, Option<i64>>(0).unwrap_or(0))
    }

    /// Latest vacuum/analyze timestamp. PostgreSQL keeps no per-table
    /// modification time, so this only moves when statistics are refreshed.
    async fn fetch_update_time(&self, table: &str) -> Result<Option<String>> {
        let client = self.client("loading update time").await?;
        let row = client
            .query_opt(
                r#"
                SELECT to_char(
                    GREATEST(last_vacuum, last_autovacuum, last_analyze, last_autoanalyze),
                    'YYYY-MM-DD HH24:MI:SS')
                FROM pg_stat_user_tables
                WHERE relname = $1 AND schemaname = $2
                "#,
                &[&table, &SCHEMA],
            )
            .await?;
        Ok(row.and_then(|r| r.get::<_, Option<String>>(0)))
    }

    async fn close(&self) {
        self.pool.close();
        debug!("Closed PostgreSQL pool");
    }
}
