//! Microsoft SQL Server driver.
//!
//! Tiberius over a bb8 pool, with tokio-util compat glue for the TCP stream.

mod adapter;

pub use adapter::MssqlAdapter;
