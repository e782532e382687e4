//! Utilities shared across the dialect adapters.
//!
//! - [`tls`]: TLS setup for PostgreSQL connections
//! - [`types`]: type-name rendering with length/precision suffixes

pub mod tls;
pub mod types;

pub use tls::postgres_tls;

/// Catalog views report missing comments as empty strings; treat those as absent.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
