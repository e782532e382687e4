//! SQLite history store, living beside the catalog tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::backend::HistoryStore;
use super::ExtractionRun;
use crate::config::EtlTask;
use crate::core::{RunMode, RunStatus};
use crate::error::{CrawlError, Result};

/// Run history in the `extraction_history` and `etl_tasks` tables.
///
/// The tables are created by [`crate::catalog::SqliteCatalog::init_schema`].
#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Last recorded run time of a task, if it ever ran.
    pub async fn task_last_run(&self, task_id: i64) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT last_run FROM etl_tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.try_get::<Option<DateTime<Utc>>, _>("last_run")?),
            None => Ok(None),
        }
    }
}

fn run_from_row(row: &SqliteRow) -> Result<ExtractionRun> {
    Ok(ExtractionRun {
        id: row.try_get("id")?,
        datasource_id: row.try_get("datasource_id")?,
        task_id: row.try_get("task_id")?,
        mode: row.try_get::<String, _>("mode")?.parse()?,
        status: row.try_get::<String, _>("status")?.parse()?,
        message: row.try_get("message")?,
        tables_count: row.try_get("tables_count")?,
        duration_seconds: row.try_get("duration_seconds")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn create_run(
        &self,
        datasource_id: i64,
        mode: RunMode,
        task_id: Option<i64>,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO extraction_history (datasource_id, task_id, mode, status, started_at) \
             VALUES (?, ?, ?, 'running', ?)",
        )
        .bind(datasource_id)
        .bind(task_id)
        .bind(mode.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| CrawlError::History(format!("creating run record: {}", e)))?;
        Ok(result.last_insert_rowid())
    }

    async fn finalize_run(
        &self,
        run_id: i64,
        status: RunStatus,
        message: Option<&str>,
        tables_count: usize,
        duration_seconds: f64,
    ) -> Result<()> {
        if !status.is_terminal() {
            return Err(CrawlError::History(format!(
                "run {} cannot be finalized as {}",
                run_id, status
            )));
        }

        let updated = sqlx::query(
            "UPDATE extraction_history \
             SET status = ?, message = ?, tables_count = ?, duration_seconds = ?, finished_at = ? \
             WHERE id = ? AND status = 'running'",
        )
        .bind(status.as_str())
        .bind(message)
        .bind(tables_count as i64)
        .bind(duration_seconds)
        .bind(Utc::now())
        .bind(run_id)
        .execute(&self.pool)
        .await
        .map_err(|e| CrawlError::History(format!("finalizing run {}: {}", run_id, e)))?
        .rows_affected();

        if updated == 0 {
            return Err(CrawlError::History(format!(
                "run {} does not exist or is already finalized",
                run_id
            )));
        }
        Ok(())
    }

    async fn last_sync_time(
        &self,
        datasource_id: i64,
        task_id: Option<i64>,
    ) -> Result<Option<DateTime<Utc>>> {
        let mut sql = String::from(
            "SELECT started_at FROM extraction_history \
             WHERE datasource_id = ? AND status IN ('success', 'partial_success')",
        );
        if task_id.is_some() {
            sql.push_str(" AND task_id = ?");
        }
        sql.push_str(" ORDER BY started_at DESC LIMIT 1");

        let mut query = sqlx::query(&sql).bind(datasource_id);
        if let Some(task_id) = task_id {
            query = query.bind(task_id);
        }

        match query.fetch_optional(&self.pool).await? {
            Some(row) => Ok(Some(row.try_get::<DateTime<Utc>, _>("started_at")?)),
            None => Ok(None),
        }
    }

    async fn recent_runs(
        &self,
        datasource_id: Option<i64>,
        limit: u32,
    ) -> Result<Vec<ExtractionRun>> {
        let rows = match datasource_id {
            Some(id) => {
                sqlx::query(
                    "SELECT * FROM extraction_history WHERE datasource_id = ? \
                     ORDER BY started_at DESC, id DESC LIMIT ?",
                )
                .bind(id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM extraction_history ORDER BY started_at DESC, id DESC LIMIT ?",
                )
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(run_from_row).collect()
    }

    async fn stamp_task_run(&self, task: &EtlTask, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO etl_tasks (id, name, datasource_id, task_type, last_run, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                name = excluded.name, \
                datasource_id = excluded.datasource_id, \
                task_type = excluded.task_type, \
                last_run = excluded.last_run, \
                updated_at = excluded.updated_at",
        )
        .bind(task.id)
        .bind(&task.name)
        .bind(task.datasource_id)
        .bind(task.task_type.as_str())
        .bind(at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "sqlite"
    }
}
