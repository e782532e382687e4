//! Error types for the extraction engine.

use thiserror::Error;

/// Main error type for extraction and reconciliation.
#[derive(Error, Debug)]
pub enum CrawlError {
    /// Configuration error (invalid YAML, missing fields, bad descriptor)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The source database could not be reached. Aborts the whole run.
    #[error("Connection to datasource {datasource} failed: {message}")]
    Connection { datasource: String, message: String },

    /// Metadata, column or statistics fetch failed for one table
    #[error("Extraction failed for table {table}: {message}")]
    TableExtraction { table: String, message: String },

    /// A single catalog query failed
    #[error("Query failed: {0}")]
    Query(String),

    /// Writing the extracted state into the catalog failed
    #[error("Reconciliation failed: {0}")]
    Reconciliation(String),

    /// Creating or finalizing a run record failed
    #[error("History error: {0}")]
    History(String),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// No adapter is available for the requested dialect
    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// MySQL/StarRocks driver or SQLite catalog store error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// SQL Server driver error
    #[error("SQL Server error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// PostgreSQL driver error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrawlError {
    /// Create a Connection error for the named datasource
    pub fn connection(datasource: impl Into<String>, message: impl Into<String>) -> Self {
        CrawlError::Connection {
            datasource: datasource.into(),
            message: message.into(),
        }
    }

    /// Create a TableExtraction error
    pub fn table(table: impl Into<String>, message: impl Into<String>) -> Self {
        CrawlError::TableExtraction {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl Into<String>, context: impl Into<String>) -> Self {
        CrawlError::Pool {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Whether this error aborts a run rather than a single table.
    ///
    /// Driver errors come from one catalog query and stay table-scoped. A
    /// lost connection or exhausted pool ends the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            CrawlError::TableExtraction { .. }
                | CrawlError::Query(_)
                | CrawlError::Sqlx(_)
                | CrawlError::Mssql(_)
                | CrawlError::Postgres(_)
        )
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            CrawlError::Config(_) | CrawlError::Yaml(_) | CrawlError::UnsupportedDialect(_) => 2,
            CrawlError::Connection { .. } | CrawlError::Pool { .. } => 3,
            CrawlError::Reconciliation(_) | CrawlError::History(_) => 4,
            CrawlError::Io(_) => 5,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, CrawlError>;
