//! No-op history store for callers that keep no run history.
//!
//! Runs still get ids, so logs can correlate them, but nothing is persisted
//! and incremental runs never find a previous sync time.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use super::backend::HistoryStore;
use super::ExtractionRun;
use crate::config::EtlTask;
use crate::core::{RunMode, RunStatus};
use crate::error::Result;

/// History store that doesn't persist anything. Logs a warning on first use.
pub struct NoOpHistoryStore {
    next_id: AtomicI64,
    warned: AtomicBool,
}

impl NoOpHistoryStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            warned: AtomicBool::new(false),
        }
    }

    fn warn_once(&self) {
        if !self.warned.swap(true, Ordering::SeqCst) {
            warn!(
                "Using no-op history store: runs will not be recorded and \
                 incremental extraction will rescan every table."
            );
        }
    }
}

impl Default for NoOpHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for NoOpHistoryStore {
    async fn create_run(
        &self,
        _datasource_id: i64,
        _mode: RunMode,
        _task_id: Option<i64>,
    ) -> Result<i64> {
        self.warn_once();
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn finalize_run(
        &self,
        _run_id: i64,
        _status: RunStatus,
        _message: Option<&str>,
        _tables_count: usize,
        _duration_seconds: f64,
    ) -> Result<()> {
        Ok(())
    }

    async fn last_sync_time(
        &self,
        _datasource_id: i64,
        _task_id: Option<i64>,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(None)
    }

    async fn recent_runs(
        &self,
        _datasource_id: Option<i64>,
        _limit: u32,
    ) -> Result<Vec<ExtractionRun>> {
        Ok(Vec::new())
    }

    async fn stamp_task_run(&self, _task: &EtlTask, _at: DateTime<Utc>) -> Result<()> {
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "noop"
    }
}
