//! Entry point for one extraction run.
//!
//! [`ExtractionRunner::run_extraction`] ties the pieces together:
//!
//! 1. open a `running` history record
//! 2. resolve the incremental sync point
//! 3. extract through the orchestrator
//! 4. reconcile into the catalog
//! 5. apply the partial-success policy and finalize the record
//!
//! Fatal errors mark the record `failed` and are returned to the caller.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::catalog::{CatalogStore, ReconcileSummary, ReconciliationEngine};
use crate::config::{DataSourceDescriptor, EtlTask, PartialSuccessPolicy};
use crate::core::{
    Connector, ExtractionOutcome, RelationshipEdge, RunMode, RunStatus, TableFailure,
    TableSnapshot,
};
use crate::error::{CrawlError, Result};
use crate::orchestrator::ExtractionOrchestrator;
use crate::state::{HistoryStore, HistoryTracker};

/// Format of `last_sync_time`, shared with every adapter's update time.
pub const SYNC_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Result contract returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub status: RunStatus,
    pub datasource_id: i64,
    pub run_id: i64,
    pub tables_count: usize,
    pub tables: Vec<TableSnapshot>,
    pub relationships: Vec<RelationshipEdge>,
    pub extraction_type: RunMode,
    pub tables_failed_count: usize,

    /// Relationships persisted to the catalog.
    pub relationships_count: usize,

    pub duration_seconds: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<TableFailure>,
}

impl PartialSuccessPolicy {
    /// Terminal status for a completed extraction.
    pub fn classify(&self, outcome: &ExtractionOutcome, relationships_count: usize) -> RunStatus {
        let missing_relationships =
            outcome.mode.fetches_relationships() && relationships_count == 0;
        let demote = match self {
            PartialSuccessPolicy::Never => false,
            PartialSuccessPolicy::TableFailures => outcome.has_failures(),
            PartialSuccessPolicy::TableFailuresOrNoRelationships => {
                outcome.has_failures() || missing_relationships
            }
        };
        if demote {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Success
        }
    }
}

/// Runs extractions end to end.
pub struct ExtractionRunner<C: Connector> {
    orchestrator: ExtractionOrchestrator<C>,
    reconciler: ReconciliationEngine,
    tracker: HistoryTracker,
    policy: PartialSuccessPolicy,
}

impl<C: Connector> ExtractionRunner<C> {
    pub fn new(
        connector: C,
        catalog: Arc<dyn CatalogStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            orchestrator: ExtractionOrchestrator::new(connector),
            reconciler: ReconciliationEngine::new(catalog),
            tracker: HistoryTracker::new(history),
            policy: PartialSuccessPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PartialSuccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn tracker(&self) -> &HistoryTracker {
        &self.tracker
    }

    /// Extract `ds` in `mode` and persist the result.
    ///
    /// For incremental runs without `last_sync_time`, the start of the
    /// latest successful run of the datasource is used.
    pub async fn run_extraction(
        &self,
        ds: &DataSourceDescriptor,
        mode: RunMode,
        last_sync_time: Option<&str>,
    ) -> Result<ExtractionReport> {
        self.execute(ds, mode, last_sync_time, None).await
    }

    /// Run a task definition against its datasource and stamp its last run.
    pub async fn run_task(&self, task: &EtlTask, ds: &DataSourceDescriptor) -> Result<ExtractionReport> {
        if !task.enabled {
            return Err(CrawlError::Config(format!("Task '{}' is disabled", task.name)));
        }
        if task.datasource_id != ds.id {
            return Err(CrawlError::Config(format!(
                "Task '{}' targets datasource {}, got {}",
                task.name, task.datasource_id, ds.id
            )));
        }

        info!(task = %task.name, datasource = %ds.name, mode = %task.task_type, "Executing task");
        let result = self.execute(ds, task.task_type, None, Some(task.id)).await;

        if let Err(e) = self.tracker.store().stamp_task_run(task, Utc::now()).await {
            warn!(task = %task.name, error = %e, "Failed to record task run time");
        }
        result
    }

    async fn execute(
        &self,
        ds: &DataSourceDescriptor,
        mode: RunMode,
        last_sync_time: Option<&str>,
        task_id: Option<i64>,
    ) -> Result<ExtractionReport> {
        let guard = self.tracker.start(ds.id, mode, task_id).await?;
        let run_id = guard.run_id();

        match self.extract_and_reconcile(ds, mode, last_sync_time, task_id).await {
            Ok((outcome, summary)) => {
                let status = match outcome.status {
                    RunStatus::Failed => RunStatus::Failed,
                    _ => self.policy.classify(&outcome, summary.relationships_count),
                };
                let message = match (&outcome.message, status) {
                    (Some(m), _) => Some(m.clone()),
                    (None, RunStatus::PartialSuccess) => Some("no relationships persisted".to_string()),
                    (None, _) => None,
                };

                let duration_seconds = guard
                    .finish(status, message.as_deref(), outcome.tables_count())
                    .await?;

                Ok(ExtractionReport {
                    status,
                    datasource_id: ds.id,
                    run_id,
                    tables_count: outcome.tables_count(),
                    tables_failed_count: outcome.tables_failed,
                    relationships_count: summary.relationships_count,
                    extraction_type: mode,
                    duration_seconds,
                    message,
                    failures: outcome.failures,
                    tables: outcome.tables,
                    relationships: outcome.relationships,
                })
            }
            Err(e) => {
                error!(run_id, datasource = %ds.name, error = %e, "Run failed");
                if let Err(history_err) = guard.fail(&e).await {
                    warn!(run_id, error = %history_err, "Failed to mark run as failed");
                }
                Err(e)
            }
        }
    }

    async fn extract_and_reconcile(
        &self,
        ds: &DataSourceDescriptor,
        mode: RunMode,
        last_sync_time: Option<&str>,
        task_id: Option<i64>,
    ) -> Result<(ExtractionOutcome, ReconcileSummary)> {
        let sync_marker = match (mode, last_sync_time) {
            (RunMode::Incremental, Some(ts)) => Some(ts.to_string()),
            (RunMode::Incremental, None) => self
                .tracker
                .store()
                .last_sync_time(ds.id, task_id)
                .await?
                .map(|t| t.format(SYNC_TIME_FORMAT).to_string()),
            _ => None,
        };
        if mode == RunMode::Incremental {
            info!(datasource = %ds.name, since = ?sync_marker, "Incremental sync point");
        }

        let outcome = self
            .orchestrator
            .extract(ds, mode, sync_marker.as_deref())
            .await?;

        if outcome.status == RunStatus::Failed {
            // Nothing was read; keep the existing catalog.
            return Ok((outcome, ReconcileSummary::default()));
        }

        let summary = self.reconciler.reconcile(ds, &outcome).await?;
        Ok((outcome, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqliteCatalog;
    use crate::state::SqliteHistoryStore;
    use crate::testing::{shop_datasource, FakeAdapter, FakeConnector, FakeTable};

    struct Harness {
        catalog: Arc<SqliteCatalog>,
        history: Arc<SqliteHistoryStore>,
    }

    impl Harness {
        async fn new() -> Self {
            let catalog = Arc::new(SqliteCatalog::connect("sqlite::memory:", 1).await.unwrap());
            let history = Arc::new(SqliteHistoryStore::new(catalog.pool().clone()));
            Self { catalog, history }
        }

        fn runner(&self, connector: FakeConnector) -> ExtractionRunner<FakeConnector> {
            ExtractionRunner::new(connector, self.catalog.clone(), self.history.clone())
        }
    }

    fn shop_adapter() -> FakeAdapter {
        FakeAdapter::mysql(
            "shop",
            vec![
                FakeTable::new("orders"),
                FakeTable::new("secrets").failing_columns(),
                FakeTable::new("users"),
            ],
        )
        .with_relationships(vec![RelationshipEdge::foreign_key(
            "fk_orders_user",
            "orders",
            "user_id",
            "users",
            "id",
        )])
    }

    #[tokio::test]
    async fn test_full_run_with_failed_table_is_partial() {
        let h = Harness::new().await;
        let report = h
            .runner(FakeConnector::new(shop_adapter()))
            .run_extraction(&shop_datasource(), RunMode::Full, None)
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::PartialSuccess);
        assert_eq!(report.tables_count, 2);
        assert_eq!(report.tables_failed_count, 1);
        assert_eq!(report.relationships_count, 1);
        assert_eq!(report.extraction_type, RunMode::Full);
        assert!(report.duration_seconds >= 0.0);
        assert!(report.message.is_some());

        let runs = h.history.recent_runs(Some(1), 10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, report.run_id);
        assert_eq!(runs[0].status, RunStatus::PartialSuccess);
        assert_eq!(runs[0].tables_count, 2);

        assert_eq!(h.catalog.list_tables(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_policy_never_reports_success() {
        let h = Harness::new().await;
        let report = h
            .runner(FakeConnector::new(shop_adapter()))
            .with_policy(PartialSuccessPolicy::Never)
            .run_extraction(&shop_datasource(), RunMode::Full, None)
            .await
            .unwrap();
        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.tables_failed_count, 1);
    }

    #[tokio::test]
    async fn test_missing_relationships_policy() {
        let h = Harness::new().await;
        let adapter = FakeAdapter::mysql("shop", vec![FakeTable::new("orders")]);
        let report = h
            .runner(FakeConnector::new(adapter))
            .with_policy(PartialSuccessPolicy::TableFailuresOrNoRelationships)
            .run_extraction(&shop_datasource(), RunMode::SchemaOnly, None)
            .await
            .unwrap();
        assert_eq!(report.status, RunStatus::PartialSuccess);
        assert_eq!(report.message.as_deref(), Some("no relationships persisted"));
        assert_eq!(report.extraction_type, RunMode::SchemaOnly);
    }

    #[tokio::test]
    async fn test_report_json_field_names() {
        let h = Harness::new().await;
        let report = h
            .runner(FakeConnector::new(FakeAdapter::mysql("shop", vec![FakeTable::new("orders")])))
            .run_extraction(&shop_datasource(), RunMode::SchemaOnly, None)
            .await
            .unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["datasource_id"], 1);
        assert_eq!(json["tables_count"], 1);
        assert_eq!(json["extraction_type"], "schema_only");
        assert_eq!(json["tables"][0]["row_count"], 0);
        assert!(json.get("message").is_none());
        assert!(json["relationships"].is_array());
    }

    #[tokio::test]
    async fn test_connection_failure_marks_run_failed() {
        let h = Harness::new().await;
        let err = h
            .runner(FakeConnector::refusing(shop_adapter()))
            .run_extraction(&shop_datasource(), RunMode::Full, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Connection { .. }));

        let run = &h.history.recent_runs(Some(1), 1).await.unwrap()[0];
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.message.as_deref().unwrap().contains("connection refused"));
        assert!(run.duration_seconds.unwrap() >= 0.0);
        assert!(h.catalog.list_tables(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_tables_failing_keeps_catalog() {
        let h = Harness::new().await;
        h.runner(FakeConnector::new(FakeAdapter::mysql("shop", vec![FakeTable::new("orders")])))
            .run_extraction(&shop_datasource(), RunMode::Full, None)
            .await
            .unwrap();

        let broken = FakeAdapter::mysql("shop", vec![FakeTable::new("orders").failing_columns()]);
        let report = h
            .runner(FakeConnector::new(broken))
            .run_extraction(&shop_datasource(), RunMode::Full, None)
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.tables_failed_count, 1);
        assert_eq!(h.catalog.list_tables(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_incremental_uses_previous_run_as_sync_point() {
        let h = Harness::new().await;
        let adapter = FakeAdapter::mysql(
            "shop",
            vec![
                FakeTable::new("stale").updated_at("2000-01-01 00:00:00"),
                FakeTable::new("fresh").updated_at("2999-01-01 00:00:00"),
                FakeTable::new("undated"),
            ],
        );
        let runner = h.runner(FakeConnector::new(adapter));

        let first = runner
            .run_extraction(&shop_datasource(), RunMode::Incremental, None)
            .await
            .unwrap();
        assert_eq!(first.tables_count, 3);

        let second = runner
            .run_extraction(&shop_datasource(), RunMode::Incremental, None)
            .await
            .unwrap();
        let names: Vec<&str> = second.tables.iter().map(|t| t.table_name.as_str()).collect();
        assert_eq!(names, vec!["fresh"]);
        assert_eq!(h.catalog.list_tables(1).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_run_task_stamps_last_run() {
        let h = Harness::new().await;
        let task: EtlTask =
            serde_yaml::from_str("id: 7\nname: nightly\ndatasource_id: 1\ntask_type: schema_only\n")
                .unwrap();
        let runner = h.runner(FakeConnector::new(shop_adapter()));

        let report = runner.run_task(&task, &shop_datasource()).await.unwrap();
        assert_eq!(report.extraction_type, RunMode::SchemaOnly);
        assert!(h.history.task_last_run(7).await.unwrap().is_some());
        assert_eq!(h.history.recent_runs(Some(1), 1).await.unwrap()[0].task_id, Some(7));

        let mut disabled = task.clone();
        disabled.enabled = false;
        assert!(matches!(
            runner.run_task(&disabled, &shop_datasource()).await,
            Err(CrawlError::Config(_))
        ));

        let mut elsewhere = task;
        elsewhere.datasource_id = 99;
        assert!(runner.run_task(&elsewhere, &shop_datasource()).await.is_err());
    }
}
