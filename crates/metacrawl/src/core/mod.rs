//! Core abstractions for dialect-agnostic metadata extraction.
//!
//! - [`schema`]: snapshot types, run modes and statuses
//! - [`traits`]: the [`DialectAdapter`] capability set and the [`Connector`] factory
//! - [`identifier`]: validated identifier quoting for dynamic catalog queries
//!
//! Driver modules (`drivers/mysql`, `drivers/postgres`, ...) implement these
//! traits; the orchestrator and reconciliation engine only see the traits.

pub mod identifier;
pub mod schema;
pub mod traits;

pub use schema::{
    ColumnSnapshot, DialectKind, ExtractionOutcome, RelationshipEdge, RunMode, RunStatus,
    TableAttempt, TableFailure, TableInfo, TableSnapshot,
};
pub use traits::{Connector, DialectAdapter};
