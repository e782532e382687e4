//! Lifecycle of one run record.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::backend::HistoryStore;
use crate::core::{RunMode, RunStatus};
use crate::error::{CrawlError, Result};

/// Opens run records and hands out a [`RunGuard`] per run.
#[derive(Clone)]
pub struct HistoryTracker {
    store: Arc<dyn HistoryStore>,
}

impl HistoryTracker {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Create a `running` record. Call before touching the source so a crash
    /// leaves a visible stuck run behind.
    pub async fn start(
        &self,
        datasource_id: i64,
        mode: RunMode,
        task_id: Option<i64>,
    ) -> Result<RunGuard> {
        let run_id = self.store.create_run(datasource_id, mode, task_id).await?;
        info!(run_id, datasource_id, mode = %mode, backend = self.store.backend_type(), "Run started");
        Ok(RunGuard {
            store: Arc::clone(&self.store),
            run_id,
            started: Instant::now(),
            finished: false,
        })
    }
}

/// An open run. Finalized by [`finish`](RunGuard::finish) or
/// [`fail`](RunGuard::fail), both of which consume the guard.
pub struct RunGuard {
    store: Arc<dyn HistoryStore>,
    run_id: i64,
    started: Instant,
    finished: bool,
}

impl RunGuard {
    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Seconds since the run was started.
    pub fn elapsed_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Write the terminal status. Returns the recorded duration in seconds.
    pub async fn finish(
        mut self,
        status: RunStatus,
        message: Option<&str>,
        tables_count: usize,
    ) -> Result<f64> {
        if !status.is_terminal() {
            return Err(CrawlError::History(format!(
                "run {} cannot finish as {}",
                self.run_id, status
            )));
        }

        self.finished = true;
        let duration = self.elapsed_seconds();
        self.store
            .finalize_run(self.run_id, status, message, tables_count, duration)
            .await?;
        info!(run_id = self.run_id, status = %status, tables = tables_count, duration_secs = duration, "Run finished");
        Ok(duration)
    }

    /// Mark the run failed with the error's message.
    pub async fn fail(self, error: &CrawlError) -> Result<f64> {
        let message = error.to_string();
        self.finish(RunStatus::Failed, Some(&message), 0).await
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.finished {
            warn!(run_id = self.run_id, "Run dropped without finalization; record stays running");
        } else {
            debug!(run_id = self.run_id, "Run guard released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqliteCatalog;
    use crate::state::SqliteHistoryStore;

    async fn tracker() -> HistoryTracker {
        let catalog = SqliteCatalog::connect("sqlite::memory:", 1).await.unwrap();
        HistoryTracker::new(Arc::new(SqliteHistoryStore::new(catalog.pool().clone())))
    }

    #[tokio::test]
    async fn test_finish_records_duration_once() {
        let tracker = tracker().await;
        let guard = tracker.start(1, RunMode::SchemaOnly, Some(4)).await.unwrap();
        let run_id = guard.run_id();

        let duration = guard.finish(RunStatus::Success, None, 12).await.unwrap();
        assert!(duration >= 0.0);

        let runs = tracker.store().recent_runs(Some(1), 5).await.unwrap();
        assert_eq!(runs[0].id, run_id);
        assert_eq!(runs[0].task_id, Some(4));
        assert_eq!(runs[0].duration_seconds, Some(duration));
        assert_eq!(runs[0].tables_count, 12);
    }

    #[tokio::test]
    async fn test_fail_keeps_error_message() {
        let tracker = tracker().await;
        let guard = tracker.start(1, RunMode::Full, None).await.unwrap();
        guard
            .fail(&CrawlError::connection("shop", "timed out"))
            .await
            .unwrap();

        let run = &tracker.store().recent_runs(None, 1).await.unwrap()[0];
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.message.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_running_is_not_a_terminal_status() {
        let tracker = tracker().await;
        let guard = tracker.start(1, RunMode::Full, None).await.unwrap();
        assert!(guard.finish(RunStatus::Running, None, 0).await.is_err());

        let run = &tracker.store().recent_runs(None, 1).await.unwrap()[0];
        assert_eq!(run.status, RunStatus::Running);
    }
}
