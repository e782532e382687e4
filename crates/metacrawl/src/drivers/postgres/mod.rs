//! PostgreSQL driver.
//!
//! Uses deadpool-postgres over tokio-postgres, with optional rustls TLS
//! selected by the datasource's `ssl_mode`.

mod adapter;

pub use adapter::PostgresAdapter;
