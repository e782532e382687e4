//! Database driver implementations.
//!
//! Each module implements [`DialectAdapter`] for one engine family:
//!
//! - [`mysql`]: MySQL and MariaDB over SQLx
//! - [`starrocks`]: StarRocks, on top of the MySQL wire protocol
//! - [`postgres`]: PostgreSQL over deadpool-postgres
//! - [`mssql`]: Microsoft SQL Server over Tiberius + bb8
//! - `oracle`: Oracle over ODBC (feature `oracle`)
//! - [`common`]: shared TLS setup and type rendering
//!
//! # Dispatch
//!
//! [`AdapterImpl`] wraps the concrete adapters in an enum and forwards each
//! trait method with a manual `match`, so the orchestrator stays generic over
//! one concrete type instead of boxing trait objects.
//!
//! # Adding New Databases
//!
//! 1. Create a module under `drivers/` implementing `DialectAdapter`
//! 2. Add a `DialectKind` variant with its default port
//! 3. Add an `AdapterImpl` variant and a branch in `DriverConnector::connect`

pub mod common;
pub mod mssql;
pub mod mysql;
#[cfg(feature = "oracle")]
pub mod oracle;
pub mod postgres;
pub mod starrocks;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

pub use common::postgres_tls;
pub use mssql::MssqlAdapter;
pub use mysql::MysqlAdapter;
#[cfg(feature = "oracle")]
pub use oracle::OracleAdapter;
pub use postgres::PostgresAdapter;
pub use starrocks::StarRocksAdapter;

use crate::config::DataSourceDescriptor;
use crate::core::{
    ColumnSnapshot, Connector, DialectAdapter, DialectKind, RelationshipEdge, TableInfo,
};
use crate::error::Result;

/// Enum-based static dispatch over the built-in adapters.
pub enum AdapterImpl {
    Mysql(MysqlAdapter),
    StarRocks(StarRocksAdapter),
    Postgres(PostgresAdapter),
    Mssql(MssqlAdapter),
    #[cfg(feature = "oracle")]
    Oracle(OracleAdapter),
}

macro_rules! dispatch {
    ($self:ident, $a:ident => $body:expr) => {
        match $self {
            AdapterImpl::Mysql($a) => $body,
            AdapterImpl::StarRocks($a) => $body,
            AdapterImpl::Postgres($a) => $body,
            AdapterImpl::Mssql($a) => $body,
            #[cfg(feature = "oracle")]
            AdapterImpl::Oracle($a) => $body,
        }
    };
}

#[async_trait]
impl DialectAdapter for AdapterImpl {
    fn kind(&self) -> DialectKind {
        dispatch!(self, a => a.kind())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        dispatch!(self, a => a.list_tables().await)
    }

    async fn table_metadata(&self, table: &str) -> Result<TableInfo> {
        dispatch!(self, a => a.table_metadata(table).await)
    }

    async fn column_metadata(&self, table: &str) -> Result<Vec<ColumnSnapshot>> {
        dispatch!(self, a => a.column_metadata(table).await)
    }

    async fn relationships(&self) -> Result<Vec<RelationshipEdge>> {
        dispatch!(self, a => a.relationships().await)
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        dispatch!(self, a => a.count_rows(table).await)
    }

    async fn measure_size(&self, table: &str) -> Result<i64> {
        dispatch!(self, a => a.measure_size(table).await)
    }

    async fn fetch_update_time(&self, table: &str) -> Result<Option<String>> {
        dispatch!(self, a => a.fetch_update_time(table).await)
    }

    async fn close(&self) {
        dispatch!(self, a => a.close().await)
    }
}

/// Opens the built-in adapter matching a descriptor's dialect.
#[derive(Debug, Clone)]
pub struct DriverConnector {
    connect_timeout: Duration,
}

impl DriverConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Default for DriverConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Connector for DriverConnector {
    type Adapter = AdapterImpl;

    async fn connect(&self, ds: &DataSourceDescriptor) -> Result<AdapterImpl> {
        debug!(datasource = %ds.name, kind = %ds.kind, "Opening source connection");
        let timeout = self.connect_timeout;
        let adapter = match ds.kind {
            DialectKind::Mysql => AdapterImpl::Mysql(MysqlAdapter::connect(ds, timeout).await?),
            DialectKind::Starrocks => {
                AdapterImpl::StarRocks(StarRocksAdapter::connect(ds, timeout).await?)
            }
            DialectKind::Postgresql => {
                AdapterImpl::Postgres(PostgresAdapter::connect(ds, timeout).await?)
            }
            DialectKind::Sqlserver => AdapterImpl::Mssql(MssqlAdapter::connect(ds, timeout).await?),
            #[cfg(feature = "oracle")]
            DialectKind::Oracle => AdapterImpl::Oracle(OracleAdapter::connect(ds).await?),
            #[cfg(not(feature = "oracle"))]
            DialectKind::Oracle => {
                return Err(crate::error::CrawlError::UnsupportedDialect(
                    "oracle (rebuild with --features oracle)".to_string(),
                ))
            }
        };
        Ok(adapter)
    }
}

/// Result of a connectivity probe.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionCheck {
    pub datasource: String,
    pub kind: DialectKind,
    pub connected: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Connect to a datasource, run its probe query, and close again.
///
/// Never fails; connection problems are reported in the returned check.
pub async fn test_connection<C: Connector>(
    connector: &C,
    ds: &DataSourceDescriptor,
) -> ConnectionCheck {
    let start = Instant::now();
    let result = connector.connect(ds).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(adapter) => {
            adapter.close().await;
            ConnectionCheck {
                datasource: ds.name.clone(),
                kind: ds.kind,
                connected: true,
                latency_ms,
                error: None,
            }
        }
        Err(e) => {
            warn!(datasource = %ds.name, error = %e, "Connection test failed");
            ConnectionCheck {
                datasource: ds.name.clone(),
                kind: ds.kind,
                connected: false,
                latency_ms,
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrawlError;

    fn descriptor(kind: DialectKind) -> DataSourceDescriptor {
        serde_yaml::from_str(&format!(
            r#"
id: 7
name: warehouse
kind: {}
host: 127.0.0.1
port: 1
username: crawler
password: secret
database: dw
"#,
            kind
        ))
        .unwrap()
    }

    #[cfg(not(feature = "oracle"))]
    #[tokio::test]
    async fn test_oracle_without_feature_is_unsupported() {
        let connector = DriverConnector::default();
        let err = connector
            .connect(&descriptor(DialectKind::Oracle))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CrawlError::UnsupportedDialect(_)));
    }

    #[tokio::test]
    async fn test_connection_check_reports_failure() {
        let connector = DriverConnector::new(Duration::from_secs(2));
        let check = test_connection(&connector, &descriptor(DialectKind::Postgresql)).await;
        assert!(!check.connected);
        assert!(check.error.is_some());
        assert_eq!(check.datasource, "warehouse");

        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["kind"], "postgresql");
        assert_eq!(json["connected"], false);
    }
}
