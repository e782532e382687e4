//! In-memory adapter and connector used by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::DataSourceDescriptor;
use crate::core::{
    ColumnSnapshot, Connector, DialectAdapter, DialectKind, RelationshipEdge, TableInfo,
};
use crate::error::{CrawlError, Result};

#[derive(Debug, Clone)]
pub struct FakeTable {
    pub name: String,
    pub update_time: Option<String>,
    pub row_count: i64,
    pub size_bytes: i64,
    pub fail_columns: bool,
    pub fail_count: bool,
    pub drop_connection: bool,
}

impl FakeTable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            update_time: None,
            row_count: 100,
            size_bytes: 16384,
            fail_columns: false,
            fail_count: false,
            drop_connection: false,
        }
    }

    pub fn updated_at(mut self, ts: &str) -> Self {
        self.update_time = Some(ts.to_string());
        self
    }

    pub fn failing_columns(mut self) -> Self {
        self.fail_columns = true;
        self
    }

    pub fn failing_count(mut self) -> Self {
        self.fail_count = true;
        self
    }

    /// The source goes away while this table's columns are read.
    pub fn dropping_connection(mut self) -> Self {
        self.drop_connection = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FakeAdapter {
    pub kind: DialectKind,
    pub schema: String,
    pub tables: Vec<FakeTable>,
    pub relationships: Vec<RelationshipEdge>,
    pub fail_relationships: bool,
    pub closed: Arc<AtomicUsize>,
}

impl FakeAdapter {
    pub fn mysql(schema: &str, tables: Vec<FakeTable>) -> Self {
        Self {
            kind: DialectKind::Mysql,
            schema: schema.to_string(),
            tables,
            relationships: Vec::new(),
            fail_relationships: false,
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_relationships(mut self, edges: Vec<RelationshipEdge>) -> Self {
        self.relationships = edges;
        self
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn table(&self, name: &str) -> Result<&FakeTable> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| CrawlError::Query(format!("no such table {}", name)))
    }
}

#[async_trait]
impl DialectAdapter for FakeAdapter {
    fn kind(&self) -> DialectKind {
        self.kind
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.iter().map(|t| t.name.clone()).collect())
    }

    async fn table_metadata(&self, table: &str) -> Result<TableInfo> {
        self.table(table)?;
        Ok(TableInfo {
            schema_name: self.schema.clone(),
            comment: Some(format!("{} table", table)),
        })
    }

    async fn column_metadata(&self, table: &str) -> Result<Vec<ColumnSnapshot>> {
        let t = self.table(table)?;
        if t.drop_connection {
            return Err(CrawlError::connection(&self.schema, "server has gone away"));
        }
        if t.fail_columns {
            return Err(CrawlError::Query("SELECT command denied".into()));
        }
        Ok(vec![
            ColumnSnapshot {
                column_name: "id".into(),
                data_type: "bigint".into(),
                is_nullable: false,
                default_value: None,
                ordinal_position: 1,
                comment: None,
            },
            ColumnSnapshot {
                column_name: "name".into(),
                data_type: "varchar(255)".into(),
                is_nullable: true,
                default_value: Some("''".into()),
                ordinal_position: 2,
                comment: Some("display name".into()),
            },
        ])
    }

    async fn relationships(&self) -> Result<Vec<RelationshipEdge>> {
        if self.fail_relationships {
            return Err(CrawlError::Query("information_schema unavailable".into()));
        }
        Ok(self.relationships.clone())
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        let t = self.table(table)?;
        if t.fail_count {
            return Err(CrawlError::Query("lock wait timeout".into()));
        }
        Ok(t.row_count)
    }

    async fn measure_size(&self, table: &str) -> Result<i64> {
        Ok(self.table(table)?.size_bytes)
    }

    async fn fetch_update_time(&self, table: &str) -> Result<Option<String>> {
        Ok(self.table(table)?.update_time.clone())
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out clones of one fake adapter, or refuses to connect.
#[derive(Debug, Clone)]
pub struct FakeConnector {
    pub adapter: FakeAdapter,
    pub refuse: bool,
}

impl FakeConnector {
    pub fn new(adapter: FakeAdapter) -> Self {
        Self {
            adapter,
            refuse: false,
        }
    }

    pub fn refusing(adapter: FakeAdapter) -> Self {
        Self {
            adapter,
            refuse: true,
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Adapter = FakeAdapter;

    async fn connect(&self, ds: &DataSourceDescriptor) -> Result<FakeAdapter> {
        if self.refuse {
            return Err(CrawlError::connection(&ds.name, "connection refused"));
        }
        Ok(self.adapter.clone())
    }
}

/// MySQL descriptor for database `shop`.
pub fn shop_datasource() -> DataSourceDescriptor {
    serde_yaml::from_str(
        r#"
id: 1
name: shop
kind: mysql
host: localhost
username: root
password: secret
database: shop
"#,
    )
    .unwrap()
}
