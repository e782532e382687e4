//! # metacrawl
//!
//! Metadata extraction engine for heterogeneous relational databases.
//!
//! This library crawls MySQL, PostgreSQL, SQL Server, Oracle and StarRocks
//! catalogs and keeps a normalized copy of their table, column and
//! foreign-key metadata, with support for:
//!
//! - **Full extraction** replacing a datasource's catalog entries
//! - **Incremental extraction** of tables changed since the last sync
//! - **Schema-only extraction** skipping row counts and sizes
//! - **Per-table fault isolation** so one unreadable table never sinks a run
//! - **Run history** with a durable record per run
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use metacrawl::{Config, DriverConnector, ExtractionRunner, RunMode, SqliteCatalog, SqliteHistoryStore};
//!
//! # async fn example() -> metacrawl::Result<()> {
//! let config = Config::load("metacrawl.yaml")?;
//! let catalog = Arc::new(SqliteCatalog::from_config(&config.catalog).await?);
//! let history = Arc::new(SqliteHistoryStore::new(catalog.pool().clone()));
//! let connector = DriverConnector::new(Duration::from_secs(config.extraction.connect_timeout_secs));
//!
//! let runner = ExtractionRunner::new(connector, catalog, history)
//!     .with_policy(config.extraction.partial_success);
//! let report = runner
//!     .run_extraction(&config.datasources[0], RunMode::Full, None)
//!     .await?;
//! println!("Extracted {} tables", report.tables_count);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod resolver;
pub mod runner;
pub mod state;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use catalog::{CatalogStore, ReconcileSummary, ReconciliationEngine, SqliteCatalog};
pub use config::{Config, DataSourceDescriptor, EtlTask, PartialSuccessPolicy};
pub use crate::core::{DialectAdapter, DialectKind, ExtractionOutcome, RunMode, RunStatus};
pub use drivers::{test_connection, ConnectionCheck, DriverConnector};
pub use error::{CrawlError, Result};
pub use orchestrator::ExtractionOrchestrator;
pub use resolver::SchemaKeyResolver;
pub use runner::{ExtractionReport, ExtractionRunner};
pub use state::{ExtractionRun, HistoryStore, HistoryTracker, NoOpHistoryStore, SqliteHistoryStore};
