//! SQL Server metadata adapter.
//!
//! Uses Tiberius over a single-connection bb8 pool. Scoped to the `dbo`
//! schema.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::config::DataSourceDescriptor;
use crate::core::identifier::qualify_mssql;
use crate::core::{ColumnSnapshot, DialectAdapter, DialectKind, RelationshipEdge, TableInfo};
use crate::drivers::common::types::{render_mssql, RawColumnType};
use crate::drivers::common::non_empty;
use crate::error::{CrawlError, Result};

const SCHEMA: &str = "dbo";

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
struct TiberiusConnectionManager {
    config: Config,
}

impl TiberiusConnectionManager {
    fn new(ds: &DataSourceDescriptor) -> Self {
        let mut config = Config::new();
        config.host(&ds.host);
        config.port(ds.port());
        config.database(&ds.database);
        config.application_name("metacrawl");
        config.authentication(AuthMethod::sql_server(&ds.username, &ds.password));
        if ds.trust_server_cert {
            config.trust_cert();
        }
        config.encryption(EncryptionLevel::Required);
        Self { config }
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let tcp = TcpStream::connect(self.config.get_addr())
            .await
            .map_err(|e| tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            })?;
        tcp.set_nodelay(true).ok();
        Client::connect(self.config.clone(), tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// SQL Server metadata adapter.
pub struct MssqlAdapter {
    pool: Pool<TiberiusConnectionManager>,
}

impl MssqlAdapter {
    /// Connect and verify the connection with `SELECT 1`.
    pub async fn connect(ds: &DataSourceDescriptor, connect_timeout: Duration) -> Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .connection_timeout(connect_timeout)
            .build(TiberiusConnectionManager::new(ds))
            .await
            .map_err(|e| CrawlError::connection(&ds.name, e.to_string()))?;

        probe(&pool, ds.kind.probe_query())
            .await
            .map_err(|e| CrawlError::connection(&ds.name, e))?;

        info!("Connected to SQL Server source: {}", ds.endpoint());

        Ok(Self { pool })
    }

    async fn client(&self) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| CrawlError::pool(e.to_string(), "getting SQL Server connection"))
    }

    /// Run a parameterized query and return the first result set.
    async fn fetch(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>> {
        let mut client = self.client().await?;
        let mut query = Query::new(sql);
        for p in params {
            query.bind(*p);
        }
        let stream = query.query(&mut *client).await?;
        Ok(stream.into_first_result().await?)
    }
}

/// Run the connect probe on a pooled connection. Every failure, including
/// reading the probe's result row, comes back as one message.
async fn probe(pool: &Pool<TiberiusConnectionManager>, sql: &str) -> std::result::Result<(), String> {
    let mut conn = pool.get().await.map_err(|e| e.to_string())?;
    conn.simple_query(sql)
        .await
        .map_err(|e| e.to_string())?
        .into_row()
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

fn text(row: &Row, idx: usize) -> Result<Option<String>> {
    Ok(row.try_get::<&str, _>(idx)?.map(str::to_string))
}

fn required_text(row: &Row, idx: usize) -> Result<String> {
    text(row, idx)?.ok_or_else(|| CrawlError::Query(format!("unexpected NULL in column {}", idx)))
}

fn int(row: &Row, idx: usize) -> Result<Option<i64>> {
    Ok(row.try_get::<i32, _>(idx)?.map(i64::from))
}

#[async_trait]
impl DialectAdapter for MssqlAdapter {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlserver
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = self
            .fetch(
                r#"
                SELECT TABLE_NAME
                FROM INFORMATION_SCHEMA.TABLES
                WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_SCHEMA = @P1
                ORDER BY TABLE_NAME
                "#,
                &[SCHEMA],
            )
            .await?;
        rows.iter().map(|row| required_text(row, 0)).collect()
    }

    async fn table_metadata(&self, table: &str) -> Result<TableInfo> {
        let rows = self
            .fetch(
                r#"
                SELECT CAST(ep.value AS NVARCHAR(4000))
                FROM sys.tables t
                LEFT JOIN sys.extended_properties ep
                  ON ep.major_id = t.object_id
                 AND ep.minor_id = 0
                 AND ep.name = 'MS_Description'
                WHERE t.name = @P1 AND t.schema_id = SCHEMA_ID(@P2)
                "#,
                &[table, SCHEMA],
            )
            .await?;

        let comment = match rows.first() {
            Some(row) => text(row, 0)?,
            None => None,
        };

        Ok(TableInfo {
            schema_name: SCHEMA.to_string(),
            comment: non_empty(comment),
        })
    }

    async fn column_metadata(&self, table: &str) -> Result<Vec<ColumnSnapshot>> {
        let rows = self
            .fetch(
                r#"
                SELECT
                    c.COLUMN_NAME,
                    c.DATA_TYPE,
                    CAST(c.CHARACTER_MAXIMUM_LENGTH AS INT),
                    CAST(c.NUMERIC_PRECISION AS INT),
                    CAST(c.NUMERIC_SCALE AS INT),
                    CAST(c.DATETIME_PRECISION AS INT),
                    CAST(CASE WHEN c.IS_NULLABLE = 'YES' THEN 1 ELSE 0 END AS INT),
                    c.COLUMN_DEFAULT,
                    CAST(c.ORDINAL_POSITION AS INT),
                    CAST(ep.value AS NVARCHAR(4000))
                FROM INFORMATION_SCHEMA.COLUMNS c
                LEFT JOIN sys.extended_properties ep
                  ON ep.major_id = OBJECT_ID(QUOTENAME(c.TABLE_SCHEMA) + '.' + QUOTENAME(c.TABLE_NAME))
                 AND ep.minor_id = COLUMNPROPERTY(ep.major_id, c.COLUMN_NAME, 'ColumnId')
                 AND ep.name = 'MS_Description'
                WHERE c.TABLE_NAME = @P1 AND c.TABLE_SCHEMA = @P2
                ORDER BY c.ORDINAL_POSITION
                "#,
                &[table, SCHEMA],
            )
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let raw = RawColumnType {
                data_type: required_text(row, 1)?,
                char_length: int(row, 2)?,
                data_length: None,
                numeric_precision: int(row, 3)?,
                numeric_scale: int(row, 4)?,
                datetime_precision: int(row, 5)?,
            };
            columns.push(ColumnSnapshot {
                column_name: required_text(row, 0)?,
                data_type: render_mssql(&raw),
                is_nullable: int(row, 6)? == Some(1),
                default_value: text(row, 7)?,
                ordinal_position: int(row, 8)?.unwrap_or(0) as i32,
                comment: non_empty(text(row, 9)?),
            });
        }
        debug!("Loaded {} columns for {}.{}", columns.len(), SCHEMA, table);
        Ok(columns)
    }

    async fn relationships(&self) -> Result<Vec<RelationshipEdge>> {
        let rows = self
            .fetch(
                r#"
                SELECT
                    fk.name,
                    t1.name,
                    c1.name,
                    t2.name,
                    c2.name
                FROM sys.foreign_keys fk
                INNER JOIN sys.foreign_key_columns fkc ON fk.object_id = fkc.constraint_object_id
                INNER JOIN sys.tables t1 ON fk.parent_object_id = t1.object_id
                INNER JOIN sys.columns c1
                    ON fkc.parent_object_id = c1.object_id AND fkc.parent_column_id = c1.column_id
                INNER JOIN sys.tables t2 ON fk.referenced_object_id = t2.object_id
                INNER JOIN sys.columns c2
                    ON fkc.referenced_object_id = c2.object_id AND fkc.referenced_column_id = c2.column_id
                WHERE t1.schema_id = SCHEMA_ID(@P1)
                  AND t2.schema_id = SCHEMA_ID(@P1)
                "#,
                &[SCHEMA],
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<RelationshipEdge> {
                Ok(RelationshipEdge::foreign_key(
                    required_text(row, 0)?,
                    required_text(row, 1)?,
                    required_text(row, 2)?,
                    required_text(row, 3)?,
                    required_text(row, 4)?,
                ))
            })
            .collect()
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT_BIG(*) FROM {}", qualify_mssql(SCHEMA, table)?);
        let rows = self.fetch(&sql, &[]).await?;
        Ok(rows
            .first()
            .map(|row| row.try_get::<i64, _>(0))
            .transpose()?
            .flatten()
            .unwrap_or(0))
    }

    async fn measure_size(&self, table: &str) -> Result<i64> {
        let rows = self
            .fetch(
                r#"
                SELECT CAST(SUM(a.total_pages) * 8 * 1024 AS BIGINT)
                FROM sys.tables t
                INNER JOIN sys.indexes i ON t.object_id = i.object_id
                INNER JOIN sys.partitions p ON i.object_id = p.object_id AND i.index_id = p.index_id
                INNER JOIN sys.allocation_units a ON p.partition_id = a.container_id
                WHERE t.name = @P1
                  AND t.schema_id = SCHEMA_ID(@P2)
                  AND t.is_ms_shipped = 0
                "#,
                &[table, SCHEMA],
            )
            .await?;
        Ok(rows
            .first()
            .map(|row| row.try_get::<i64, _>(0))
            .transpose()?
            .flatten()
            .unwrap_or(0))
    }

    /// Statistics refresh time of the table's first index. SQL Server keeps
    /// no data-modification timestamp, so incremental runs can miss changes
    /// made since the last statistics update.
    async fn fetch_update_time(&self, table: &str) -> Result<Option<String>> {
        let qualified = format!("{}.{}", SCHEMA, table);
        let rows = self
            .fetch(
                "SELECT CONVERT(VARCHAR(19), STATS_DATE(OBJECT_ID(@P1), 1), 120)",
                &[qualified.as_str()],
            )
            .await?;
        match rows.first() {
            Some(row) => text(row, 0),
            None => Ok(None),
        }
    }

    /// bb8 has no shutdown call. The pooled client is closed when the
    /// adapter, and with it the pool, is dropped at the end of the run.
    async fn close(&self) {
        debug!(
            "Releasing SQL Server pool ({} connections)",
            self.pool.state().connections
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_source() -> DataSourceDescriptor {
        serde_yaml::from_str(
            r#"
id: 7
name: erp
kind: sqlserver
host: 127.0.0.1
port: 1
username: sa
password: secret
database: erp
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_probe_failures_are_connection_errors() {
        let err = match MssqlAdapter::connect(&unreachable_source(), Duration::from_secs(2)).await {
            Ok(_) => panic!("nothing listens on port 1"),
            Err(e) => e,
        };
        assert!(matches!(err, CrawlError::Connection { ref datasource, .. } if datasource == "erp"));
        assert_eq!(err.exit_code(), 3);
    }
}
