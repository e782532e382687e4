//! Persisted catalog: the persistence port and the reconciliation engine.
//!
//! - [`CatalogStore`] / [`CatalogTransaction`]: the port the engine writes
//!   through. Every reconciliation runs inside one transaction.
//! - [`ReconciliationEngine`]: merges an [`ExtractionOutcome`] into the store.
//! - [`SqliteCatalog`]: the bundled SQLite implementation.
//!
//! [`ExtractionOutcome`]: crate::core::ExtractionOutcome

mod reconcile;
mod schema;
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

pub use reconcile::{ReconcileSummary, ReconciliationEngine};
pub use sqlite::SqliteCatalog;

use crate::core::TableSnapshot;
use crate::error::Result;
use crate::resolver::{ResolvedRelationship, TableMapping};

/// Opens write transactions against the catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Start a transaction. Dropping it without [`CatalogTransaction::commit`]
    /// rolls everything back.
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>>;

    /// Store name for logging.
    fn backend_type(&self) -> &'static str;
}

/// Write operations available inside one catalog transaction.
#[async_trait]
pub trait CatalogTransaction: Send {
    /// Id of the persisted table keyed by `(datasource_id, schema, name)`.
    async fn find_table(&mut self, datasource_id: i64, schema: &str, name: &str)
        -> Result<Option<i64>>;

    /// Delete every table, column and relationship of the datasource, then
    /// insert `tables` with their columns. Returns the new `schema.table` ids.
    async fn replace_all_tables(
        &mut self,
        datasource_id: i64,
        tables: &[TableSnapshot],
    ) -> Result<TableMapping>;

    /// Update `existing` in place and replace its columns, or insert a new
    /// table when `existing` is `None`. Returns the table id.
    async fn upsert_table(
        &mut self,
        datasource_id: i64,
        existing: Option<i64>,
        table: &TableSnapshot,
    ) -> Result<i64>;

    /// Replace the datasource's relationships with `relationships`.
    async fn replace_relationships(
        &mut self,
        datasource_id: i64,
        relationships: &[ResolvedRelationship],
    ) -> Result<usize>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// A row of `metadata_tables`.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct PersistedTable {
    pub id: i64,
    pub datasource_id: i64,
    pub schema_name: String,
    pub table_name: String,
    pub row_count: i64,
    pub size_bytes: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row of `metadata_columns`.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct PersistedColumn {
    pub id: i64,
    pub table_id: i64,
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub default_value: Option<String>,
    pub ordinal_position: i64,
    pub comment: Option<String>,
}

/// A row of `metadata_relationships`.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct PersistedRelationship {
    pub id: i64,
    pub constraint_name: String,
    pub table_id: i64,
    pub column_name: String,
    pub referenced_table_id: i64,
    pub referenced_column_name: String,
    pub constraint_type: String,
}
