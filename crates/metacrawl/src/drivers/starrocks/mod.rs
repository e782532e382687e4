//! StarRocks metadata adapter.
//!
//! StarRocks speaks the MySQL protocol and exposes a MySQL-compatible
//! `information_schema`, so this adapter delegates to [`MysqlAdapter`] for
//! everything except table size. `DATA_LENGTH` is not maintained by
//! StarRocks; the size comes from `SHOW DATA`, which reports a
//! human-readable string such as `3.768 GB`.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use sqlx::Row;
use tracing::{debug, warn};

use crate::config::DataSourceDescriptor;
use crate::core::identifier::qualify_mysql;
use crate::core::{ColumnSnapshot, DialectAdapter, DialectKind, RelationshipEdge, TableInfo};
use crate::drivers::mysql::MysqlAdapter;
use crate::error::Result;

/// StarRocks metadata adapter.
pub struct StarRocksAdapter {
    inner: MysqlAdapter,
}

impl StarRocksAdapter {
    pub async fn connect(ds: &DataSourceDescriptor, connect_timeout: Duration) -> Result<Self> {
        Ok(Self {
            inner: MysqlAdapter::connect(ds, connect_timeout).await?,
        })
    }
}

#[async_trait]
impl DialectAdapter for StarRocksAdapter {
    fn kind(&self) -> DialectKind {
        DialectKind::Starrocks
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        self.inner.list_tables().await
    }

    async fn table_metadata(&self, table: &str) -> Result<TableInfo> {
        self.inner.table_metadata(table).await
    }

    async fn column_metadata(&self, table: &str) -> Result<Vec<ColumnSnapshot>> {
        self.inner.column_metadata(table).await
    }

    async fn relationships(&self) -> Result<Vec<RelationshipEdge>> {
        self.inner.foreign_keys(true).await
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        self.inner.count_rows(table).await
    }

    async fn measure_size(&self, table: &str) -> Result<i64> {
        let query = format!(
            "SHOW DATA FROM {}",
            qualify_mysql(self.inner.database(), table)?
        );
        // Text protocol; SHOW statements can't be prepared.
        let rows: Vec<MySqlRow> = sqlx::raw_sql(&query).fetch_all(self.inner.pool()).await?;

        if rows.is_empty() {
            warn!(table = %table, "SHOW DATA returned no rows");
            return Ok(0);
        }

        let cells: Vec<Vec<Option<String>>> = rows.iter().map(row_as_strings).collect();
        match size_from_show_data(&cells) {
            Some(size) => {
                debug!(table = %table, size_bytes = size, "Parsed StarRocks table size");
                Ok(size)
            }
            None => {
                warn!(table = %table, "SHOW DATA returned no usable size row");
                Ok(0)
            }
        }
    }

    async fn fetch_update_time(&self, table: &str) -> Result<Option<String>> {
        self.inner.info_schema_update_time(table).await
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

fn row_as_strings(row: &MySqlRow) -> Vec<Option<String>> {
    (0..row.len())
        .map(|i| row.try_get::<Option<String>, _>(i).ok().flatten())
        .collect()
}

/// Pick the size out of `SHOW DATA` rows.
///
/// Rows are `(TableName, IndexName, Size, ReplicaCount, RowCount)`. The
/// summary row carries `Total` in the second column and is skipped; the
/// first remaining row with a size column wins.
pub fn size_from_show_data(rows: &[Vec<Option<String>>]) -> Option<i64> {
    rows.iter()
        .filter(|row| {
            !(row.len() >= 2
                && row[1]
                    .as_deref()
                    .is_some_and(|v| v.trim().eq_ignore_ascii_case("total")))
        })
        .find_map(|row| row.get(2).map(|size| parse_size(size.as_deref().unwrap_or(""))))
}

/// Parse a StarRocks size string into bytes.
///
/// Accepts `KB`, `MB`, `GB` and `TB` suffixes (base 1024, case-insensitive,
/// fractional values rounded down) or a plain integer byte count. Anything
/// else is 0.
pub fn parse_size(size: &str) -> i64 {
    let size = size.trim().to_uppercase();

    const UNITS: [(&str, i32); 4] = [("KB", 1), ("MB", 2), ("GB", 3), ("TB", 4)];
    for (suffix, power) in UNITS {
        if size.contains(suffix) {
            return size
                .replace(suffix, "")
                .trim()
                .parse::<f64>()
                .map(|value| (value * 1024f64.powi(power)).floor() as i64)
                .unwrap_or(0);
        }
    }

    size.parse::<i64>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<Option<String>> {
        cells.iter().map(|c| Some(c.to_string())).collect()
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("500 KB"), 512_000);
        assert_eq!(parse_size("1.5 MB"), 1_572_864);
        assert_eq!(parse_size("3.768 GB"), (3.768_f64 * 1024.0 * 1024.0 * 1024.0) as i64);
        assert_eq!(parse_size("3.768 GB"), 4_045_859_192);
        assert_eq!(parse_size("2.0 TB"), 2 * 1024_i64.pow(4));
    }

    #[test]
    fn test_parse_size_is_case_and_space_insensitive() {
        assert_eq!(parse_size("  500 kb "), 512_000);
        assert_eq!(parse_size("1mb"), 1_048_576);
    }

    #[test]
    fn test_parse_size_plain_and_garbage() {
        assert_eq!(parse_size("4096"), 4096);
        assert_eq!(parse_size("0"), 0);
        assert_eq!(parse_size("n/a"), 0);
        assert_eq!(parse_size("12.5 B"), 0);
        assert_eq!(parse_size("lots GB"), 0);
        assert_eq!(parse_size(""), 0);
    }

    #[test]
    fn test_show_data_skips_total_row() {
        let rows = vec![
            row(&["orders", "Total", "9.000 GB", "3", "100"]),
            row(&["orders", "orders", "1.5 MB", "3", "100"]),
        ];
        assert_eq!(size_from_show_data(&rows), Some(1_572_864));
    }

    #[test]
    fn test_show_data_without_size_column() {
        let rows = vec![row(&["orders", "TOTAL", "1 GB"]), row(&["orders", "x"])];
        assert_eq!(size_from_show_data(&rows), None);
    }
}
