//! MySQL metadata adapter.
//!
//! Reads `INFORMATION_SCHEMA` through a single-connection SQLx pool. String
//! columns are cast to `CHAR` because MySQL 8 reports several catalog
//! columns as binary strings.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::Row;
use tracing::{debug, info};

use crate::config::DataSourceDescriptor;
use crate::core::identifier::qualify_mysql;
use crate::core::{ColumnSnapshot, DialectAdapter, DialectKind, RelationshipEdge, TableInfo};
use crate::drivers::common::types::{render_mysql, RawColumnType};
use crate::drivers::common::non_empty;
use crate::error::{CrawlError, Result};

/// MySQL metadata adapter. Also the transport for StarRocks.
pub struct MysqlAdapter {
    pool: MySqlPool,
    database: String,
}

impl MysqlAdapter {
    /// Connect and verify the connection with `SELECT 1`.
    pub async fn connect(ds: &DataSourceDescriptor, connect_timeout: Duration) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&ds.host)
            .port(ds.port())
            .database(&ds.database)
            .username(&ds.username)
            .password(&ds.password)
            .ssl_mode(MySqlSslMode::Preferred);

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(connect_timeout)
            .connect_with(options)
            .await
            .map_err(|e| CrawlError::connection(&ds.name, e.to_string()))?;

        sqlx::query(ds.kind.probe_query())
            .fetch_one(&pool)
            .await
            .map_err(|e| CrawlError::connection(&ds.name, e.to_string()))?;

        info!("Connected to {} source: {}", ds.kind, ds.endpoint());

        Ok(Self {
            pool,
            database: ds.database.clone(),
        })
    }

    pub(crate) fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub(crate) fn database(&self) -> &str {
        &self.database
    }

    /// Foreign keys pointing into the configured database. With
    /// `same_schema_only`, the referencing table must live there too.
    pub(crate) async fn foreign_keys(&self, same_schema_only: bool) -> Result<Vec<RelationshipEdge>> {
        let mut query = String::from(
            r#"
            SELECT
                CAST(CONSTRAINT_NAME AS CHAR(255)) AS CONSTRAINT_NAME,
                CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME,
                CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(REFERENCED_TABLE_NAME AS CHAR(255)) AS REFERENCED_TABLE_NAME,
                CAST(REFERENCED_COLUMN_NAME AS CHAR(255)) AS REFERENCED_COLUMN_NAME
            FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
            WHERE REFERENCED_TABLE_SCHEMA = ?
              AND REFERENCED_TABLE_NAME IS NOT NULL
            "#,
        );
        if same_schema_only {
            query.push_str("  AND TABLE_SCHEMA = ?\n");
        }

        let mut q = sqlx::query(&query).bind(&self.database);
        if same_schema_only {
            q = q.bind(&self.database);
        }
        let rows: Vec<MySqlRow> = q.fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<RelationshipEdge> {
                Ok(RelationshipEdge::foreign_key(
                    row.try_get::<String, _>("CONSTRAINT_NAME")?,
                    row.try_get::<String, _>("TABLE_NAME")?,
                    row.try_get::<String, _>("COLUMN_NAME")?,
                    row.try_get::<String, _>("REFERENCED_TABLE_NAME")?,
                    row.try_get::<String, _>("REFERENCED_COLUMN_NAME")?,
                ))
            })
            .collect()
    }

    pub(crate) async fn info_schema_update_time(&self, table: &str) -> Result<Option<String>> {
        let row: Option<MySqlRow> = sqlx::query(
            r#"
            SELECT DATE_FORMAT(UPDATE_TIME, '%Y-%m-%d %H:%i:%s') AS update_time
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            "#,
        )
        .bind(&self.database)
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.try_get::<Option<String>, _>("update_time")?),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl DialectAdapter for MysqlAdapter {
    fn kind(&self) -> DialectKind {
        DialectKind::Mysql
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows: Vec<MySqlRow> = sqlx::query(
            r#"
            SELECT CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
            "#,
        )
        .bind(&self.database)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CrawlError::Query(format!("listing MySQL tables: {}", e)))?;

        let tables = rows
            .iter()
            .map(|row| row.try_get::<String, _>("TABLE_NAME"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!("Found {} tables in {}", tables.len(), self.database);
        Ok(tables)
    }

    async fn table_metadata(&self, table: &str) -> Result<TableInfo> {
        let row: Option<MySqlRow> = sqlx::query(
            r#"
            SELECT CAST(TABLE_COMMENT AS CHAR(2048)) AS TABLE_COMMENT
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            "#,
        )
        .bind(&self.database)
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;

        let comment = match row {
            Some(row) => row.try_get::<Option<String>, _>("TABLE_COMMENT")?,
            None => None,
        };

        Ok(TableInfo {
            schema_name: self.database.clone(),
            comment: non_empty(comment),
        })
    }

    async fn column_metadata(&self, table: &str) -> Result<Vec<ColumnSnapshot>> {
        let rows: Vec<MySqlRow> = sqlx::query(
            r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(DATA_TYPE AS CHAR(255)) AS DATA_TYPE,
                CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED) AS char_length,
                CAST(NUMERIC_PRECISION AS SIGNED) AS num_precision,
                CAST(NUMERIC_SCALE AS SIGNED) AS num_scale,
                CAST(DATETIME_PRECISION AS SIGNED) AS dt_precision,
                CAST(IF(IS_NULLABLE = 'YES', 1, 0) AS SIGNED) AS is_nullable,
                CAST(COLUMN_DEFAULT AS CHAR(4096)) AS COLUMN_DEFAULT,
                CAST(ORDINAL_POSITION AS SIGNED) AS ORDINAL_POSITION,
                CAST(COLUMN_COMMENT AS CHAR(2048)) AS COLUMN_COMMENT
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
            "#,
        )
        .bind(&self.database)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(column_from_row).collect()
    }

    async fn relationships(&self) -> Result<Vec<RelationshipEdge>> {
        self.foreign_keys(false).await
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        let query = format!(
            "SELECT COUNT(*) AS cnt FROM {}",
            qualify_mysql(&self.database, table)?
        );
        let row: MySqlRow = sqlx::query(&query).fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>("cnt")?)
    }

    async fn measure_size(&self, table: &str) -> Result<i64> {
        let row: Option<MySqlRow> = sqlx::query(
            r#"
            SELECT CAST(COALESCE(DATA_LENGTH, 0) + COALESCE(INDEX_LENGTH, 0) AS SIGNED) AS size_bytes
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            "#,
        )
        .bind(&self.database)
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.try_get::<Option<i64>, _>("size_bytes")?.unwrap_or(0)),
            None => Ok(0),
        }
    }

    async fn fetch_update_time(&self, table: &str) -> Result<Option<String>> {
        self.info_schema_update_time(table).await
    }

    async fn close(&self) {
        self.pool.close().await;
        debug!("Closed MySQL pool for {}", self.database);
    }
}

/// Build a column from an `INFORMATION_SCHEMA.COLUMNS` row.
pub(crate) fn column_from_row(row: &MySqlRow) -> Result<ColumnSnapshot> {
    let raw = RawColumnType {
        data_type: row.try_get::<String, _>("DATA_TYPE")?,
        char_length: row.try_get::<Option<i64>, _>("char_length")?,
        data_length: None,
        numeric_precision: row.try_get::<Option<i64>, _>("num_precision")?,
        numeric_scale: row.try_get::<Option<i64>, _>("num_scale")?,
        datetime_precision: row.try_get::<Option<i64>, _>("dt_precision")?,
    };

    Ok(ColumnSnapshot {
        column_name: row.try_get::<String, _>("COLUMN_NAME")?,
        data_type: render_mysql(&raw),
        is_nullable: row.try_get::<i64, _>("is_nullable")? == 1,
        default_value: row.try_get::<Option<String>, _>("COLUMN_DEFAULT")?,
        ordinal_position: row.try_get::<i64, _>("ORDINAL_POSITION")? as i32,
        comment: non_empty(row.try_get::<Option<String>, _>("COLUMN_COMMENT")?),
    })
}
