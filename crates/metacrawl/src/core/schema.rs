//! Metadata types produced by an extraction run.
//!
//! Everything here is plain data: adapters fill these in, the orchestrator
//! collects them into an [`ExtractionOutcome`], and the reconciliation engine
//! writes them into the catalog.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CrawlError, Result};

/// Database engine family a datasource speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialectKind {
    #[serde(alias = "mariadb")]
    Mysql,
    #[serde(alias = "postgres", alias = "pg")]
    Postgresql,
    #[serde(alias = "mssql", alias = "sql_server")]
    Sqlserver,
    Oracle,
    Starrocks,
}

impl DialectKind {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DialectKind::Mysql => "mysql",
            DialectKind::Postgresql => "postgresql",
            DialectKind::Sqlserver => "sqlserver",
            DialectKind::Oracle => "oracle",
            DialectKind::Starrocks => "starrocks",
        }
    }

    /// Port the engine listens on when the descriptor leaves it unset.
    pub fn default_port(&self) -> u16 {
        match self {
            DialectKind::Mysql => 3306,
            DialectKind::Postgresql => 5432,
            DialectKind::Sqlserver => 1433,
            DialectKind::Oracle => 1521,
            DialectKind::Starrocks => 9030,
        }
    }

    /// Query used to check that a connection is alive.
    pub fn probe_query(&self) -> &'static str {
        match self {
            DialectKind::Oracle => "SELECT 1 FROM DUAL",
            _ => "SELECT 1",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectKind {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DialectKind::Mysql),
            "postgresql" | "postgres" | "pg" => Ok(DialectKind::Postgresql),
            "sqlserver" | "mssql" | "sql_server" => Ok(DialectKind::Sqlserver),
            "oracle" => Ok(DialectKind::Oracle),
            "starrocks" => Ok(DialectKind::Starrocks),
            other => Err(CrawlError::UnsupportedDialect(format!(
                "'{}'. Valid types: mysql, postgresql, sqlserver, oracle, starrocks",
                other
            ))),
        }
    }
}

/// Extraction mode for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Every table, with statistics and foreign keys. Replaces the catalog.
    Full,
    /// Only tables changed since the last sync. Merges into the catalog.
    Incremental,
    /// Every table, structure only. Statistics are forced to zero.
    SchemaOnly,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Full => "full",
            RunMode::Incremental => "incremental",
            RunMode::SchemaOnly => "schema_only",
        }
    }

    /// Whether foreign keys are fetched and persisted.
    pub fn fetches_relationships(&self) -> bool {
        !matches!(self, RunMode::Incremental)
    }

    /// Whether row counts and sizes are probed.
    pub fn collects_stats(&self) -> bool {
        !matches!(self, RunMode::SchemaOnly)
    }

    /// Whether reconciliation wipes the datasource before writing.
    pub fn replaces_catalog(&self) -> bool {
        !matches!(self, RunMode::Incremental)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "full" => Ok(RunMode::Full),
            "incremental" => Ok(RunMode::Incremental),
            "schema_only" => Ok(RunMode::SchemaOnly),
            other => Err(CrawlError::Config(format!(
                "Invalid extraction mode '{}'. Valid values: full, incremental, schema_only",
                other
            ))),
        }
    }
}

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    PartialSuccess,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::PartialSuccess => "partial_success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "partial_success" => Ok(RunStatus::PartialSuccess),
            "failed" => Ok(RunStatus::Failed),
            other => Err(CrawlError::History(format!("unknown run status '{}'", other))),
        }
    }
}

/// Table-level attributes returned by `table_metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub schema_name: String,
    pub comment: Option<String>,
}

/// One column, as rendered by the source dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSnapshot {
    pub column_name: String,

    /// Type name with length/precision suffix where the dialect exposes one,
    /// e.g. `varchar(255)` or `number(10,2)`.
    pub data_type: String,

    pub is_nullable: bool,
    pub default_value: Option<String>,

    /// 1-based position within the table.
    pub ordinal_position: i32,

    pub comment: Option<String>,
}

/// One extracted table together with its columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub table_name: String,
    pub schema_name: String,
    pub row_count: i64,
    pub size_bytes: i64,
    pub comment: Option<String>,
    pub columns: Vec<ColumnSnapshot>,
}

impl TableSnapshot {
    /// Schema-qualified name, `schema.table`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }
}

/// A declared foreign key column pair. Table names are unqualified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub constraint_name: String,
    pub table_name: String,
    pub column_name: String,
    pub referenced_table_name: String,
    pub referenced_column_name: String,
    #[serde(default = "default_constraint_type")]
    pub constraint_type: String,
}

fn default_constraint_type() -> String {
    "FOREIGN KEY".to_string()
}

impl RelationshipEdge {
    pub fn foreign_key(
        constraint_name: impl Into<String>,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        referenced_table_name: impl Into<String>,
        referenced_column_name: impl Into<String>,
    ) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            table_name: table_name.into(),
            column_name: column_name.into(),
            referenced_table_name: referenced_table_name.into(),
            referenced_column_name: referenced_column_name.into(),
            constraint_type: default_constraint_type(),
        }
    }
}

/// Result of attempting one table.
#[derive(Debug)]
pub enum TableAttempt {
    /// Table was read successfully.
    Extracted(TableSnapshot),
    /// Table was unchanged since the last sync (incremental only).
    Skipped { table: String },
    /// Metadata or column fetch failed. `error` is a
    /// [`CrawlError::TableExtraction`].
    Failed { table: String, error: CrawlError },
}

/// A table that failed during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFailure {
    pub table: String,
    pub error: String,
}

/// Everything one extraction run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutcome {
    pub status: RunStatus,
    pub mode: RunMode,
    pub tables: Vec<TableSnapshot>,
    pub relationships: Vec<RelationshipEdge>,
    pub tables_attempted: usize,
    pub tables_succeeded: usize,
    pub tables_failed: usize,
    pub tables_skipped: usize,
    pub failures: Vec<TableFailure>,
    pub message: Option<String>,
}

impl ExtractionOutcome {
    /// Empty outcome for the given mode.
    pub fn new(mode: RunMode) -> Self {
        Self {
            status: RunStatus::Success,
            mode,
            tables: Vec::new(),
            relationships: Vec::new(),
            tables_attempted: 0,
            tables_succeeded: 0,
            tables_failed: 0,
            tables_skipped: 0,
            failures: Vec::new(),
            message: None,
        }
    }

    /// Fold one per-table result into the outcome.
    pub fn record(&mut self, attempt: TableAttempt) {
        match attempt {
            TableAttempt::Extracted(table) => {
                self.tables_attempted += 1;
                self.tables_succeeded += 1;
                self.tables.push(table);
            }
            TableAttempt::Skipped { .. } => {
                self.tables_skipped += 1;
            }
            TableAttempt::Failed { table, error } => {
                self.tables_attempted += 1;
                self.tables_failed += 1;
                self.failures.push(TableFailure {
                    table,
                    error: error.to_string(),
                });
            }
        }
    }

    /// Number of tables present in the outcome.
    pub fn tables_count(&self) -> usize {
        self.tables.len()
    }

    pub fn has_failures(&self) -> bool {
        self.tables_failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str) -> TableSnapshot {
        TableSnapshot {
            table_name: name.to_string(),
            schema_name: "shop".to_string(),
            row_count: 10,
            size_bytes: 4096,
            comment: None,
            columns: vec![],
        }
    }

    #[test]
    fn test_dialect_aliases() {
        assert_eq!("mssql".parse::<DialectKind>().unwrap(), DialectKind::Sqlserver);
        assert_eq!("SQL_SERVER".parse::<DialectKind>().unwrap(), DialectKind::Sqlserver);
        assert_eq!("pg".parse::<DialectKind>().unwrap(), DialectKind::Postgresql);
        assert_eq!("StarRocks".parse::<DialectKind>().unwrap(), DialectKind::Starrocks);
        assert!("sybase".parse::<DialectKind>().is_err());
    }

    #[test]
    fn test_dialect_default_ports() {
        assert_eq!(DialectKind::Mysql.default_port(), 3306);
        assert_eq!(DialectKind::Postgresql.default_port(), 5432);
        assert_eq!(DialectKind::Sqlserver.default_port(), 1433);
        assert_eq!(DialectKind::Oracle.default_port(), 1521);
        assert_eq!(DialectKind::Starrocks.default_port(), 9030);
        assert_eq!(DialectKind::Oracle.probe_query(), "SELECT 1 FROM DUAL");
    }

    #[test]
    fn test_run_mode_capabilities() {
        assert!(RunMode::Full.fetches_relationships());
        assert!(RunMode::SchemaOnly.fetches_relationships());
        assert!(!RunMode::Incremental.fetches_relationships());

        assert!(RunMode::Full.collects_stats());
        assert!(RunMode::Incremental.collects_stats());
        assert!(!RunMode::SchemaOnly.collects_stats());

        assert!(!RunMode::Incremental.replaces_catalog());
    }

    #[test]
    fn test_run_mode_parsing() {
        assert_eq!("schema-only".parse::<RunMode>().unwrap(), RunMode::SchemaOnly);
        assert_eq!("FULL".parse::<RunMode>().unwrap(), RunMode::Full);
        assert!("delta".parse::<RunMode>().is_err());
    }

    #[test]
    fn test_run_status_serde_names() {
        let json = serde_json::to_string(&RunStatus::PartialSuccess).unwrap();
        assert_eq!(json, "\"partial_success\"");
        assert_eq!("failed".parse::<RunStatus>().unwrap(), RunStatus::Failed);
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn test_outcome_counts_exclude_skipped_tables() {
        let mut outcome = ExtractionOutcome::new(RunMode::Incremental);
        outcome.record(TableAttempt::Extracted(snapshot("orders")));
        outcome.record(TableAttempt::Skipped {
            table: "users".into(),
        });
        outcome.record(TableAttempt::Failed {
            table: "audit".into(),
            error: CrawlError::table("audit", "permission denied"),
        });

        assert_eq!(outcome.tables_attempted, 2);
        assert_eq!(outcome.tables_succeeded, 1);
        assert_eq!(outcome.tables_failed, 1);
        assert_eq!(outcome.tables_skipped, 1);
        assert_eq!(
            outcome.tables_count(),
            outcome.tables_attempted - outcome.tables_failed
        );
        assert_eq!(outcome.failures[0].table, "audit");
        assert_eq!(
            outcome.failures[0].error,
            "Extraction failed for table audit: permission denied"
        );
    }

    #[test]
    fn test_table_key_is_schema_qualified() {
        assert_eq!(snapshot("orders").key(), "shop.orders");
    }
}
