//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{DialectKind, RunMode};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where extracted metadata and run history are stored.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Extraction behavior.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Datasources that can be crawled.
    #[serde(default)]
    pub datasources: Vec<DataSourceDescriptor>,

    /// Scheduled extraction tasks.
    #[serde(default)]
    pub tasks: Vec<EtlTask>,
}

impl Config {
    /// Look up a datasource by id.
    pub fn datasource(&self, id: i64) -> Option<&DataSourceDescriptor> {
        self.datasources.iter().find(|ds| ds.id == id)
    }

    /// Look up a datasource by id or name.
    pub fn find_datasource(&self, key: &str) -> Option<&DataSourceDescriptor> {
        match key.parse::<i64>() {
            Ok(id) => self.datasource(id),
            Err(_) => self.datasources.iter().find(|ds| ds.name == key),
        }
    }

    /// Look up a task by id.
    pub fn task(&self, id: i64) -> Option<&EtlTask> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

/// Catalog store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// SQLite URL of the catalog (default: "sqlite://metacrawl.db").
    #[serde(default = "default_catalog_url")]
    pub url: String,

    /// Maximum catalog connections (default: 5).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: default_catalog_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Extraction behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Seconds to wait for a source connection (default: 30).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// When a run is reported as partial_success (default: table_failures).
    #[serde(default)]
    pub partial_success: PartialSuccessPolicy,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            partial_success: PartialSuccessPolicy::default(),
        }
    }
}

/// Caller-defined threshold for demoting a run to `partial_success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialSuccessPolicy {
    /// Report success whenever the run completes.
    Never,

    /// Any failed table demotes the run.
    #[default]
    TableFailures,

    /// Failed tables, or a full/schema_only run that persisted no relationships.
    TableFailuresOrNoRelationships,
}

/// Connection identity of one source database.
#[derive(Clone, Serialize, Deserialize)]
pub struct DataSourceDescriptor {
    /// Catalog identity of the datasource.
    pub id: i64,

    /// Display name.
    pub name: String,

    /// Database engine.
    pub kind: DialectKind,

    /// Database host.
    pub host: String,

    /// Database port (defaults per kind when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Username.
    pub username: String,

    /// Password.
    pub password: String,

    /// Database name (service name on Oracle).
    pub database: String,

    /// PostgreSQL SSL mode: disable, require, verify-ca, verify-full (default: "disable").
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,

    /// Trust the SQL Server certificate without validation (default: true).
    #[serde(default = "default_true")]
    pub trust_server_cert: bool,

    /// ODBC driver name used for Oracle.
    #[serde(default = "default_odbc_driver")]
    pub odbc_driver: String,
}

impl DataSourceDescriptor {
    /// Effective port.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.kind.default_port())
    }

    /// `host:port/database`, for logs and error messages.
    pub fn endpoint(&self) -> String {
        format!("{}:{}/{}", self.host, self.port(), self.database)
    }
}

impl fmt::Debug for DataSourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port())
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// A named, schedulable extraction against one datasource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlTask {
    pub id: i64,

    pub name: String,

    pub datasource_id: i64,

    /// Extraction mode (default: full).
    #[serde(default = "default_task_type")]
    pub task_type: RunMode,

    /// Cron expression, evaluated by an external scheduler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

// Default value functions for serde
fn default_catalog_url() -> String {
    "sqlite://metacrawl.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_odbc_driver() -> String {
    "Oracle ODBC Driver".to_string()
}

fn default_task_type() -> RunMode {
    RunMode::Full
}

fn default_true() -> bool {
    true
}
