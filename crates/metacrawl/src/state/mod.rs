//! Extraction run history.
//!
//! Every run gets a record that starts as `running` and ends exactly once as
//! `success`, `partial_success` or `failed`.

mod backend;
mod noop;
mod sqlite;
mod tracker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use backend::HistoryStore;
pub use noop::NoOpHistoryStore;
pub use sqlite::SqliteHistoryStore;
pub use tracker::{HistoryTracker, RunGuard};

use crate::core::{RunMode, RunStatus};

/// A persisted run record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRun {
    pub id: i64,
    pub datasource_id: i64,

    /// Task that triggered the run, if any.
    pub task_id: Option<i64>,

    pub mode: RunMode,
    pub status: RunStatus,

    /// Summary or error text.
    pub message: Option<String>,

    /// Tables present in the outcome.
    pub tables_count: i64,

    /// Wall-clock duration; `None` while running.
    pub duration_seconds: Option<f64>,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
