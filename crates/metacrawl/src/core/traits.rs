//! Core traits for dialect-agnostic metadata extraction.
//!
//! - [`DialectAdapter`]: reads catalog metadata from one live source connection
//! - [`Connector`]: opens adapters for datasource descriptors
//!
//! # Design Patterns
//!
//! - **Strategy**: each dialect answers the same capability set with its own catalog queries
//! - **Template Method**: best-effort probes (`row_count`, `table_size`, `table_update_time`)
//!   have default implementations wrapping the fallible per-dialect hooks

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::DataSourceDescriptor;
use crate::error::Result;

use super::schema::{ColumnSnapshot, DialectKind, RelationshipEdge, TableInfo};

/// Metadata access for one source database.
///
/// An adapter owns a live connection for the duration of a run. Callers must
/// call [`close`](DialectAdapter::close) when done; the orchestrator does this
/// on every exit path.
#[async_trait]
pub trait DialectAdapter: Send + Sync {
    /// Dialect this adapter speaks.
    fn kind(&self) -> DialectKind;

    /// Base tables visible in the configured schema. Views and system tables
    /// are excluded.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Schema name and comment for a table.
    async fn table_metadata(&self, table: &str) -> Result<TableInfo>;

    /// Columns of a table, ordered by ordinal position.
    async fn column_metadata(&self, table: &str) -> Result<Vec<ColumnSnapshot>>;

    /// Declared foreign keys in the configured schema. Table names are unqualified.
    async fn relationships(&self) -> Result<Vec<RelationshipEdge>>;

    /// Exact row count. Prefer [`row_count`](DialectAdapter::row_count).
    async fn count_rows(&self, table: &str) -> Result<i64>;

    /// Physical size in bytes. Prefer [`table_size`](DialectAdapter::table_size).
    async fn measure_size(&self, table: &str) -> Result<i64>;

    /// Last-change timestamp as `YYYY-MM-DD HH:MM:SS`, if the dialect has one.
    async fn fetch_update_time(&self, _table: &str) -> Result<Option<String>> {
        Ok(None)
    }

    /// Row count, or 0 if the count query fails.
    async fn row_count(&self, table: &str) -> i64 {
        match self.count_rows(table).await {
            Ok(count) => count,
            Err(e) => {
                warn!(table = %table, error = %e, "Failed to count rows, recording 0");
                0
            }
        }
    }

    /// Size in bytes, or 0 if the size probe fails.
    async fn table_size(&self, table: &str) -> i64 {
        match self.measure_size(table).await {
            Ok(size) => size,
            Err(e) => {
                warn!(table = %table, error = %e, "Failed to measure table size, recording 0");
                0
            }
        }
    }

    /// Update timestamp used for incremental change detection, or `None`.
    async fn table_update_time(&self, table: &str) -> Option<String> {
        match self.fetch_update_time(table).await {
            Ok(ts) => ts,
            Err(e) => {
                debug!(table = %table, error = %e, "No update time available");
                None
            }
        }
    }

    /// Release the connection.
    async fn close(&self);
}

/// Opens [`DialectAdapter`]s.
///
/// Passed explicitly into the orchestrator so runs share no process-wide
/// connection state and tests can substitute fakes.
#[async_trait]
pub trait Connector: Send + Sync {
    type Adapter: DialectAdapter;

    /// Connect to the datasource. Failures map to `CrawlError::Connection`.
    async fn connect(&self, datasource: &DataSourceDescriptor) -> Result<Self::Adapter>;
}
