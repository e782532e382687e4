//! History store trait for extraction run records.
//!
//! The [`HistoryStore`] trait defines how run lifecycles are persisted:
//!
//! - **SQLite**: `SqliteHistoryStore` in `sqlite.rs`, sharing the catalog database
//! - **No-op**: `NoOpHistoryStore` in `noop.rs`, for callers that keep no history
//!
//! The runner works with `Arc<dyn HistoryStore>` without knowing the concrete type.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::ExtractionRun;
use crate::config::EtlTask;
use crate::core::{RunMode, RunStatus};
use crate::error::Result;

/// Persistence for extraction run records.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; independent runs may share one store.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Record a new run in `running` state and return its id.
    async fn create_run(&self, datasource_id: i64, mode: RunMode, task_id: Option<i64>)
        -> Result<i64>;

    /// Move a running run to its terminal status.
    ///
    /// Fails if the run does not exist or was already finalized.
    async fn finalize_run(
        &self,
        run_id: i64,
        status: RunStatus,
        message: Option<&str>,
        tables_count: usize,
        duration_seconds: f64,
    ) -> Result<()>;

    /// Start time of the latest successful or partially successful run.
    ///
    /// With `task_id`, only runs of that task are considered.
    async fn last_sync_time(
        &self,
        datasource_id: i64,
        task_id: Option<i64>,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Newest runs first. `None` lists every datasource.
    async fn recent_runs(&self, datasource_id: Option<i64>, limit: u32)
        -> Result<Vec<ExtractionRun>>;

    /// Remember that `task` last ran at `at`.
    async fn stamp_task_run(&self, task: &EtlTask, at: DateTime<Utc>) -> Result<()>;

    /// Backend name for logging.
    fn backend_type(&self) -> &'static str;
}
