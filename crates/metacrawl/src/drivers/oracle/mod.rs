//! Oracle driver.
//!
//! Connects through ODBC, so an Oracle ODBC driver (Instant Client ODBC)
//! must be installed and named in the datasource's `odbc_driver`.
//!
//! # Feature Flag
//!
//! Only compiled with the `oracle` feature:
//!
//! ```toml
//! [dependencies]
//! metacrawl = { version = "0.3", features = ["oracle"] }
//! ```

mod adapter;

pub use adapter::OracleAdapter;
