//! SQLite catalog store.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info};

use super::schema::SQLITE_INIT;
use super::{
    CatalogStore, CatalogTransaction, PersistedColumn, PersistedRelationship, PersistedTable,
};
use crate::config::CatalogConfig;
use crate::core::TableSnapshot;
use crate::error::Result;
use crate::resolver::{ResolvedRelationship, TableMapping};

/// Catalog persisted in a SQLite database.
///
/// Also hosts the run history tables; see [`crate::state::SqliteHistoryStore`].
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    /// Open (creating if needed) the database at `url` and apply the schema.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let connect_opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_opts)
            .await?;

        let catalog = Self { pool };
        catalog.init_schema().await?;
        info!("Catalog store ready: {}", url);
        Ok(catalog)
    }

    pub async fn from_config(config: &CatalogConfig) -> Result<Self> {
        Self::connect(&config.url, config.max_connections).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the catalog and history tables if they do not exist.
    pub async fn init_schema(&self) -> Result<()> {
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Tables of a datasource, ordered by schema and name.
    pub async fn list_tables(&self, datasource_id: i64) -> Result<Vec<PersistedTable>> {
        let tables = sqlx::query_as::<_, PersistedTable>(
            "SELECT * FROM metadata_tables WHERE datasource_id = ? ORDER BY schema_name, table_name",
        )
        .bind(datasource_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tables)
    }

    /// Columns of a table, by ordinal position.
    pub async fn list_columns(&self, table_id: i64) -> Result<Vec<PersistedColumn>> {
        let columns = sqlx::query_as::<_, PersistedColumn>(
            "SELECT id, table_id, column_name, data_type, is_nullable, default_value, \
             ordinal_position, comment \
             FROM metadata_columns WHERE table_id = ? ORDER BY ordinal_position",
        )
        .bind(table_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(columns)
    }

    /// Relationships whose source table belongs to the datasource.
    pub async fn list_relationships(&self, datasource_id: i64) -> Result<Vec<PersistedRelationship>> {
        let relationships = sqlx::query_as::<_, PersistedRelationship>(
            "SELECT r.id, r.constraint_name, r.table_id, r.column_name, r.referenced_table_id, \
             r.referenced_column_name, r.constraint_type \
             FROM metadata_relationships r \
             JOIN metadata_tables t ON t.id = r.table_id \
             WHERE t.datasource_id = ? ORDER BY r.id",
        )
        .bind(datasource_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(relationships)
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    fn backend_type(&self) -> &'static str {
        "sqlite"
    }
}

struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl CatalogTransaction for SqliteTransaction {
    async fn find_table(
        &mut self,
        datasource_id: i64,
        schema: &str,
        name: &str,
    ) -> Result<Option<i64>> {
        let row = sqlx::query(
            "SELECT id FROM metadata_tables \
             WHERE datasource_id = ? AND schema_name = ? AND table_name = ?",
        )
        .bind(datasource_id)
        .bind(schema)
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => Ok(Some(row.try_get::<i64, _>("id")?)),
            None => Ok(None),
        }
    }

    async fn replace_all_tables(
        &mut self,
        datasource_id: i64,
        tables: &[TableSnapshot],
    ) -> Result<TableMapping> {
        let conn = &mut *self.tx;
        delete_relationships(conn, datasource_id).await?;
        sqlx::query(
            "DELETE FROM metadata_columns WHERE table_id IN \
             (SELECT id FROM metadata_tables WHERE datasource_id = ?)",
        )
        .bind(datasource_id)
        .execute(&mut *conn)
        .await?;
        let removed = sqlx::query("DELETE FROM metadata_tables WHERE datasource_id = ?")
            .bind(datasource_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        debug!(datasource_id, removed, "Cleared catalog tables");

        let mut mapping = TableMapping::with_capacity(tables.len());
        for table in tables {
            let id = insert_table(conn, datasource_id, table).await?;
            insert_columns(conn, id, table).await?;
            mapping.insert(table.key(), id);
        }
        Ok(mapping)
    }

    async fn upsert_table(
        &mut self,
        datasource_id: i64,
        existing: Option<i64>,
        table: &TableSnapshot,
    ) -> Result<i64> {
        let conn = &mut *self.tx;
        let id = match existing {
            Some(id) => {
                sqlx::query(
                    "UPDATE metadata_tables \
                     SET row_count = ?, size_bytes = ?, comment = ?, updated_at = ? \
                     WHERE id = ?",
                )
                .bind(table.row_count)
                .bind(table.size_bytes)
                .bind(&table.comment)
                .bind(Utc::now())
                .bind(id)
                .execute(&mut *conn)
                .await?;
                sqlx::query("DELETE FROM metadata_columns WHERE table_id = ?")
                    .bind(id)
                    .execute(&mut *conn)
                    .await?;
                id
            }
            None => insert_table(conn, datasource_id, table).await?,
        };
        insert_columns(conn, id, table).await?;
        Ok(id)
    }

    async fn replace_relationships(
        &mut self,
        datasource_id: i64,
        relationships: &[ResolvedRelationship],
    ) -> Result<usize> {
        let conn = &mut *self.tx;
        delete_relationships(conn, datasource_id).await?;

        let now = Utc::now();
        for rel in relationships {
            sqlx::query(
                "INSERT INTO metadata_relationships \
                 (constraint_name, table_id, column_name, referenced_table_id, \
                  referenced_column_name, constraint_type, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&rel.constraint_name)
            .bind(rel.table_id)
            .bind(&rel.column_name)
            .bind(rel.referenced_table_id)
            .bind(&rel.referenced_column_name)
            .bind(&rel.constraint_type)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        }
        Ok(relationships.len())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

async fn delete_relationships(conn: &mut SqliteConnection, datasource_id: i64) -> Result<()> {
    sqlx::query(
        "DELETE FROM metadata_relationships WHERE \
         table_id IN (SELECT id FROM metadata_tables WHERE datasource_id = ?) \
         OR referenced_table_id IN (SELECT id FROM metadata_tables WHERE datasource_id = ?)",
    )
    .bind(datasource_id)
    .bind(datasource_id)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_table(
    conn: &mut SqliteConnection,
    datasource_id: i64,
    table: &TableSnapshot,
) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO metadata_tables \
         (datasource_id, schema_name, table_name, row_count, size_bytes, comment, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(datasource_id)
    .bind(&table.schema_name)
    .bind(&table.table_name)
    .bind(table.row_count)
    .bind(table.size_bytes)
    .bind(&table.comment)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.last_insert_rowid())
}

async fn insert_columns(conn: &mut SqliteConnection, table_id: i64, table: &TableSnapshot) -> Result<()> {
    for column in &table.columns {
        sqlx::query(
            "INSERT INTO metadata_columns \
             (table_id, column_name, data_type, is_nullable, default_value, ordinal_position, comment) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(table_id)
        .bind(&column.column_name)
        .bind(&column.data_type)
        .bind(column.is_nullable)
        .bind(&column.default_value)
        .bind(column.ordinal_position)
        .bind(&column.comment)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ColumnSnapshot;

    async fn memory_catalog() -> SqliteCatalog {
        SqliteCatalog::connect("sqlite::memory:", 1).await.unwrap()
    }

    fn table(name: &str) -> TableSnapshot {
        TableSnapshot {
            table_name: name.to_string(),
            schema_name: "shop".to_string(),
            row_count: 5,
            size_bytes: 1024,
            comment: None,
            columns: vec![ColumnSnapshot {
                column_name: "id".into(),
                data_type: "int".into(),
                is_nullable: false,
                default_value: None,
                ordinal_position: 1,
                comment: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let catalog = memory_catalog().await;
        catalog.init_schema().await.unwrap();
        assert!(catalog.list_tables(1).await.unwrap().is_empty());
        assert_eq!(catalog.backend_type(), "sqlite");
    }

    #[tokio::test]
    async fn test_find_and_upsert_table() {
        let catalog = memory_catalog().await;
        let mut tx = catalog.begin().await.unwrap();
        assert_eq!(tx.find_table(1, "shop", "orders").await.unwrap(), None);

        let id = tx.upsert_table(1, None, &table("orders")).await.unwrap();
        assert_eq!(tx.find_table(1, "shop", "orders").await.unwrap(), Some(id));
        assert_eq!(tx.find_table(2, "shop", "orders").await.unwrap(), None);

        let mut changed = table("orders");
        changed.row_count = 99;
        assert_eq!(tx.upsert_table(1, Some(id), &changed).await.unwrap(), id);
        tx.commit().await.unwrap();

        let tables = catalog.list_tables(1).await.unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].row_count, 99);
        assert_eq!(catalog.list_columns(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let catalog = memory_catalog().await;
        {
            let mut tx = catalog.begin().await.unwrap();
            tx.replace_all_tables(1, &[table("orders")]).await.unwrap();
        }
        assert!(catalog.list_tables(1).await.unwrap().is_empty());
    }
}
