//! MySQL/MariaDB driver.
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+
//!
//! The same adapter carries StarRocks traffic; see [`crate::drivers::starrocks`].

mod adapter;

pub use adapter::MysqlAdapter;
