//! Oracle metadata adapter.
//!
//! Reads the `user_*` dictionary views of the connecting user, so the
//! schema is always the upper-cased username. Oracle stores unquoted names
//! in upper case; table and column names are lower-cased on the way out.
//!
//! ODBC handles are not safe to share across threads, so every statement
//! opens its own connection while holding `conn_mutex`.

use std::sync::Arc;

use async_trait::async_trait;
use odbc_api::{buffers::TextRowSet, ConnectionOptions, Cursor, Environment, ResultSetMetadata};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::DataSourceDescriptor;
use crate::core::identifier::{escape_literal, qualify_ansi};
use crate::core::{ColumnSnapshot, DialectAdapter, DialectKind, RelationshipEdge, TableInfo};
use crate::drivers::common::non_empty;
use crate::drivers::common::types::{render_oracle, RawColumnType};
use crate::error::{CrawlError, Result};

/// Rows fetched per ODBC round trip.
const FETCH_BATCH: usize = 500;

/// Longest text value fetched; longer values are truncated by the driver.
const MAX_TEXT_LEN: usize = 4096;

type TextRow = Vec<Option<String>>;

/// Oracle metadata adapter.
pub struct OracleAdapter {
    env: Arc<Environment>,
    connection_string: String,
    schema: String,
    conn_mutex: Mutex<()>,
}

impl OracleAdapter {
    /// Connect and verify the connection with `SELECT 1 FROM DUAL`.
    pub async fn connect(ds: &DataSourceDescriptor) -> Result<Self> {
        let env = Environment::new().map_err(|e| {
            CrawlError::connection(
                &ds.name,
                format!(
                    "Failed to create ODBC environment: {}. Install the Oracle Instant Client ODBC driver.",
                    e
                ),
            )
        })?;

        let adapter = Self {
            env: Arc::new(env),
            connection_string: ds.odbc_connection_string(),
            schema: ds.username.to_uppercase(),
            conn_mutex: Mutex::new(()),
        };

        {
            let _guard = adapter.conn_mutex.lock().await;
            adapter
                .query_sync(ds.kind.probe_query())
                .map_err(|e| CrawlError::connection(&ds.name, e.to_string()))?;
        }

        info!(
            "Connected to Oracle via ODBC ({}): {}",
            ds.odbc_driver,
            ds.endpoint()
        );

        Ok(adapter)
    }

    fn get_connection(&self) -> Result<odbc_api::Connection<'_>> {
        self.env
            .connect_with_connection_string(&self.connection_string, ConnectionOptions::default())
            .map_err(|e| CrawlError::pool(format!("ODBC connection failed: {}", e), "getting ODBC connection"))
    }

    /// Execute a statement and return every row as text.
    fn query_sync(&self, sql: &str) -> Result<Vec<TextRow>> {
        let conn = self.get_connection()?;
        let mut rows = Vec::new();

        let cursor = conn
            .execute(sql, ())
            .map_err(|e| CrawlError::Query(format!("ODBC query failed: {} - SQL: {}", e, sql)))?;

        if let Some(mut cursor) = cursor {
            let num_cols = cursor
                .num_result_cols()
                .map_err(|e| CrawlError::Query(format!("Failed to get column count: {}", e)))?
                as usize;

            let mut buffers = TextRowSet::for_cursor(FETCH_BATCH, &mut cursor, Some(MAX_TEXT_LEN))
                .map_err(|e| CrawlError::Query(format!("Failed to create row buffer: {}", e)))?;

            let mut row_cursor = cursor
                .bind_buffer(&mut buffers)
                .map_err(|e| CrawlError::Query(format!("Failed to bind buffer: {}", e)))?;

            while let Some(batch) = row_cursor
                .fetch()
                .map_err(|e| CrawlError::Query(format!("Failed to fetch rows: {}", e)))?
            {
                for row_idx in 0..batch.num_rows() {
                    let row = (0..num_cols)
                        .map(|col_idx| {
                            batch
                                .at(col_idx, row_idx)
                                .map(|bytes| String::from_utf8_lossy(bytes).to_string())
                        })
                        .collect();
                    rows.push(row);
                }
            }
        }

        Ok(rows)
    }

    async fn query(&self, sql: &str) -> Result<Vec<TextRow>> {
        let _guard = self.conn_mutex.lock().await;
        self.query_sync(sql)
    }

    /// First column of the first row.
    async fn scalar(&self, sql: &str) -> Result<Option<String>> {
        Ok(self
            .query(sql)
            .await?
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next().flatten()))
    }
}

fn cell(row: &TextRow, idx: usize) -> Option<String> {
    row.get(idx).cloned().flatten()
}

fn required_cell(row: &TextRow, idx: usize) -> Result<String> {
    cell(row, idx).ok_or_else(|| CrawlError::Query(format!("unexpected NULL in column {}", idx)))
}

fn number_cell(row: &TextRow, idx: usize) -> Option<i64> {
    cell(row, idx).and_then(|v| v.trim().parse::<i64>().ok())
}

#[async_trait]
impl DialectAdapter for OracleAdapter {
    fn kind(&self) -> DialectKind {
        DialectKind::Oracle
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = self
            .query("SELECT table_name FROM user_tables ORDER BY table_name")
            .await?;
        rows.iter()
            .map(|row| required_cell(row, 0).map(|name| name.to_lowercase()))
            .collect()
    }

    async fn table_metadata(&self, table: &str) -> Result<TableInfo> {
        let sql = format!(
            "SELECT comments FROM user_tab_comments WHERE table_name = UPPER('{}')",
            escape_literal(table)?
        );
        Ok(TableInfo {
            schema_name: self.schema.clone(),
            comment: non_empty(self.scalar(&sql).await?),
        })
    }

    async fn column_metadata(&self, table: &str) -> Result<Vec<ColumnSnapshot>> {
        let sql = format!(
            r#"
            SELECT
                c.column_name,
                c.data_type,
                CASE c.nullable WHEN 'Y' THEN 'YES' ELSE 'NO' END,
                c.data_default,
                c.column_id,
                com.comments,
                c.char_length,
                c.data_length,
                c.data_precision,
                c.data_scale
            FROM user_tab_columns c
            LEFT JOIN user_col_comments com
                ON c.table_name = com.table_name
                AND c.column_name = com.column_name
            WHERE c.table_name = UPPER('{}')
            ORDER BY c.column_id
            "#,
            escape_literal(table)?
        );

        let rows = self.query(&sql).await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let raw = RawColumnType {
                data_type: required_cell(row, 1)?,
                char_length: number_cell(row, 6),
                data_length: number_cell(row, 7),
                numeric_precision: number_cell(row, 8),
                numeric_scale: number_cell(row, 9),
                datetime_precision: None,
            };
            columns.push(ColumnSnapshot {
                column_name: required_cell(row, 0)?.to_lowercase(),
                data_type: render_oracle(&raw),
                is_nullable: cell(row, 2).as_deref() == Some("YES"),
                default_value: cell(row, 3).map(|d| d.trim().to_string()),
                ordinal_position: number_cell(row, 4).unwrap_or(0) as i32,
                comment: non_empty(cell(row, 5)),
            });
        }
        Ok(columns)
    }

    async fn relationships(&self) -> Result<Vec<RelationshipEdge>> {
        let rows = self
            .query(
                r#"
                SELECT
                    fk.constraint_name,
                    fk.table_name,
                    fk_col.column_name,
                    pk.table_name,
                    pk_col.column_name
                FROM user_constraints fk
                JOIN user_cons_columns fk_col
                    ON fk.constraint_name = fk_col.constraint_name
                    AND fk.table_name = fk_col.table_name
                JOIN user_constraints pk
                    ON fk.r_constraint_name = pk.constraint_name
                JOIN user_cons_columns pk_col
                    ON pk.constraint_name = pk_col.constraint_name
                    AND pk.table_name = pk_col.table_name
                    AND fk_col.position = pk_col.position
                WHERE fk.constraint_type = 'R'
                "#,
            )
            .await?;

        let edges = rows
            .iter()
            .map(|row| -> Result<RelationshipEdge> {
                Ok(RelationshipEdge::foreign_key(
                    required_cell(row, 0)?,
                    required_cell(row, 1)?.to_lowercase(),
                    required_cell(row, 2)?.to_lowercase(),
                    required_cell(row, 3)?.to_lowercase(),
                    required_cell(row, 4)?.to_lowercase(),
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("Found {} foreign key columns in {}", edges.len(), self.schema);
        Ok(edges)
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}",
            qualify_ansi(&self.schema, &table.to_uppercase())?
        );
        Ok(self
            .scalar(&sql)
            .await?
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0))
    }

    async fn measure_size(&self, table: &str) -> Result<i64> {
        let sql = format!(
            "SELECT SUM(bytes) FROM user_segments WHERE segment_name = UPPER('{}') AND segment_type = 'TABLE'",
            escape_literal(table)?
        );
        Ok(self
            .scalar(&sql)
            .await?
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0))
    }

    /// Last DDL time. Oracle does not track DML per table here, so only
    /// structural changes are visible to incremental runs.
    async fn fetch_update_time(&self, table: &str) -> Result<Option<String>> {
        let sql = format!(
            "SELECT TO_CHAR(last_ddl_time, 'YYYY-MM-DD HH24:MI:SS') FROM user_objects \
             WHERE object_name = UPPER('{}') AND object_type = 'TABLE'",
            escape_literal(table)?
        );
        self.scalar(&sql).await
    }

    /// Each query opens its own ODBC connection and drops it before
    /// returning, so nothing stays open between calls. Taking the lock waits
    /// out a query still in flight; the environment goes with the adapter.
    async fn close(&self) {
        let _guard = self.conn_mutex.lock().await;
        debug!("Closed Oracle adapter for {}", self.schema);
    }
}
