//! Extraction orchestrator: drives one adapter through a run.
//!
//! A run is `connect → list tables → per-table loop → relationship phase →
//! close`. Connecting, listing tables, and losing the connection mid-loop
//! abort the run; every other per-table problem becomes a
//! [`TableAttempt::Failed`] and the loop moves on.
//! The outcome is only marked failed when tables were attempted and none
//! of them could be read.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::DataSourceDescriptor;
use crate::core::{
    Connector, DialectAdapter, ExtractionOutcome, RunMode, RunStatus, TableAttempt,
    TableSnapshot,
};
use crate::error::{CrawlError, Result};

/// Runs extractions against datasources opened through a [`Connector`].
pub struct ExtractionOrchestrator<C: Connector> {
    connector: C,
}

impl<C: Connector> ExtractionOrchestrator<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Connect to `ds` and extract its metadata in `mode`.
    ///
    /// `last_sync_time` (`YYYY-MM-DD HH:MM:SS`) is only consulted by
    /// incremental runs; without it an incremental run extracts every table.
    /// The adapter is closed before returning, whether or not extraction
    /// succeeded.
    pub async fn extract(
        &self,
        ds: &DataSourceDescriptor,
        mode: RunMode,
        last_sync_time: Option<&str>,
    ) -> Result<ExtractionOutcome> {
        info!(datasource = %ds.name, kind = %ds.kind, mode = %mode, "Starting extraction");

        let adapter = self.connector.connect(ds).await?;
        let result = extract_with(&adapter, mode, last_sync_time).await;
        adapter.close().await;

        match &result {
            Ok(outcome) => info!(
                datasource = %ds.name,
                tables = outcome.tables_count(),
                relationships = outcome.relationships.len(),
                "Extraction finished"
            ),
            Err(e) => warn!(datasource = %ds.name, error = %e, "Extraction aborted"),
        }
        result
    }
}

/// Extract from an already connected adapter. Does not close it.
pub async fn extract_with<A: DialectAdapter + ?Sized>(
    adapter: &A,
    mode: RunMode,
    last_sync_time: Option<&str>,
) -> Result<ExtractionOutcome> {
    let start = Instant::now();
    let mut outcome = ExtractionOutcome::new(mode);

    let tables = adapter.list_tables().await?;
    info!("Found {} tables", tables.len());

    let sync_marker = match mode {
        RunMode::Incremental => last_sync_time,
        _ => None,
    };

    for table in &tables {
        let attempt = extract_table(adapter, table, mode, sync_marker).await?;
        match &attempt {
            TableAttempt::Extracted(snapshot) => debug!(
                table = %table,
                columns = snapshot.columns.len(),
                rows = snapshot.row_count,
                bytes = snapshot.size_bytes,
                "Extracted table"
            ),
            TableAttempt::Skipped { .. } => debug!(table = %table, "Unchanged since last sync"),
            TableAttempt::Failed { error, .. } => {
                warn!(table = %table, error = %error, "Failed to extract table")
            }
        }
        outcome.record(attempt);
    }

    let mut notes = Vec::new();
    if outcome.has_failures() {
        let names: Vec<&str> = outcome.failures.iter().map(|f| f.table.as_str()).collect();
        notes.push(format!(
            "{} of {} tables failed: {}",
            outcome.tables_failed,
            outcome.tables_attempted,
            names.join(", ")
        ));
    }

    if mode.fetches_relationships() {
        match adapter.relationships().await {
            Ok(edges) => {
                debug!("Fetched {} foreign key columns", edges.len());
                outcome.relationships = edges;
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch relationships");
                notes.push(format!("relationships unavailable: {}", e));
            }
        }
    }

    if outcome.has_failures() && outcome.tables_succeeded == 0 {
        outcome.status = RunStatus::Failed;
    }
    if !notes.is_empty() {
        outcome.message = Some(notes.join("; "));
    }

    info!(
        total = tables.len(),
        succeeded = outcome.tables_succeeded,
        failed = outcome.tables_failed,
        skipped = outcome.tables_skipped,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Extraction summary"
    );

    Ok(outcome)
}

/// Extract one table. Table-scoped errors become [`TableAttempt::Failed`];
/// only errors that [`CrawlError::is_fatal`] reports are returned.
async fn extract_table<A: DialectAdapter + ?Sized>(
    adapter: &A,
    table: &str,
    mode: RunMode,
    last_sync_time: Option<&str>,
) -> Result<TableAttempt> {
    if let Some(since) = last_sync_time {
        // Timestamps share one format across dialects, so string order is time order.
        match adapter.table_update_time(table).await {
            Some(updated) if updated.as_str() > since => {}
            _ => {
                return Ok(TableAttempt::Skipped {
                    table: table.to_string(),
                })
            }
        }
    }

    match read_table(adapter, table, mode).await {
        Ok(snapshot) => Ok(TableAttempt::Extracted(snapshot)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => Ok(TableAttempt::Failed {
            table: table.to_string(),
            error: CrawlError::table(table, e.to_string()),
        }),
    }
}

async fn read_table<A: DialectAdapter + ?Sized>(
    adapter: &A,
    table: &str,
    mode: RunMode,
) -> Result<TableSnapshot> {
    let info = adapter.table_metadata(table).await?;
    let columns = adapter.column_metadata(table).await?;

    let (row_count, size_bytes) = if mode.collects_stats() {
        (adapter.row_count(table).await, adapter.table_size(table).await)
    } else {
        (0, 0)
    };

    Ok(TableSnapshot {
        table_name: table.to_string(),
        schema_name: info.schema_name,
        row_count,
        size_bytes,
        comment: info.comment,
        columns,
    })
}
