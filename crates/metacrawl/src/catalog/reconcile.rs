//! Merges an extraction outcome into the catalog.
//!
//! Full and schema-only runs replace the datasource's catalog wholesale and
//! rebuild its relationships. Incremental runs upsert the tables they saw
//! and leave every other table, and all relationships, alone. Either way the
//! whole write happens in one transaction.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::CatalogStore;
use crate::config::DataSourceDescriptor;
use crate::core::ExtractionOutcome;
use crate::error::{CrawlError, Result};
use crate::resolver::SchemaKeyResolver;

/// What one reconciliation wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub tables_written: usize,
    pub columns_written: usize,
    /// Relationships persisted, after dropping unresolvable edges.
    pub relationships_count: usize,
    pub tables_inserted: usize,
    pub tables_updated: usize,
}

/// Writes extraction outcomes through a [`CatalogStore`].
pub struct ReconciliationEngine {
    store: Arc<dyn CatalogStore>,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Persist `outcome` for `ds`. On error nothing is written and the
    /// error is reported as [`CrawlError::Reconciliation`].
    pub async fn reconcile(
        &self,
        ds: &DataSourceDescriptor,
        outcome: &ExtractionOutcome,
    ) -> Result<ReconcileSummary> {
        let resolver = SchemaKeyResolver::for_datasource(ds);
        match self.apply(ds.id, &resolver, outcome).await {
            Ok(summary) => {
                info!(
                    datasource = %ds.name,
                    mode = %outcome.mode,
                    tables = summary.tables_written,
                    columns = summary.columns_written,
                    relationships = summary.relationships_count,
                    "Catalog updated"
                );
                Ok(summary)
            }
            Err(e) => {
                warn!(datasource = %ds.name, error = %e, "Catalog update rolled back");
                Err(match e {
                    CrawlError::Reconciliation(_) => e,
                    other => CrawlError::Reconciliation(other.to_string()),
                })
            }
        }
    }

    async fn apply(
        &self,
        datasource_id: i64,
        resolver: &SchemaKeyResolver,
        outcome: &ExtractionOutcome,
    ) -> Result<ReconcileSummary> {
        let mut tx = self.store.begin().await?;
        let mut summary = ReconcileSummary {
            tables_written: outcome.tables.len(),
            columns_written: outcome.tables.iter().map(|t| t.columns.len()).sum(),
            ..Default::default()
        };

        if outcome.mode.replaces_catalog() {
            let mapping = tx.replace_all_tables(datasource_id, &outcome.tables).await?;
            summary.tables_inserted = mapping.len();

            let resolved = resolver.resolve_all(&outcome.relationships, &mapping);
            let dropped = outcome.relationships.len() - resolved.len();
            if dropped > 0 {
                debug!(
                    schema = resolver.schema(),
                    dropped, "Relationships with an endpoint outside the extracted tables"
                );
            }
            summary.relationships_count = tx.replace_relationships(datasource_id, &resolved).await?;
        } else {
            for table in &outcome.tables {
                let existing = tx
                    .find_table(datasource_id, &table.schema_name, &table.table_name)
                    .await?;
                tx.upsert_table(datasource_id, existing, table).await?;
                if existing.is_some() {
                    summary.tables_updated += 1;
                } else {
                    summary.tables_inserted += 1;
                }
            }
        }

        tx.commit().await?;
        Ok(summary)
    }
}
