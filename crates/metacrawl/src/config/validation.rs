//! Configuration validation.

use std::collections::HashSet;

use super::{Config, DataSourceDescriptor};
use crate::core::DialectKind;
use crate::error::{CrawlError, Result};

/// Oracle service names longer than this are rejected by the listener.
const MAX_ORACLE_SERVICE_NAME: usize = 30;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.catalog.url.is_empty() {
        return Err(CrawlError::Config("catalog.url is required".into()));
    }
    if config.catalog.max_connections == 0 {
        return Err(CrawlError::Config(
            "catalog.max_connections must be at least 1".into(),
        ));
    }
    if config.extraction.connect_timeout_secs == 0 {
        return Err(CrawlError::Config(
            "extraction.connect_timeout_secs must be at least 1".into(),
        ));
    }

    let mut ids = HashSet::new();
    for ds in &config.datasources {
        validate_datasource(ds)?;
        if !ids.insert(ds.id) {
            return Err(CrawlError::Config(format!(
                "duplicate datasource id {}",
                ds.id
            )));
        }
    }

    let mut task_ids = HashSet::new();
    for task in &config.tasks {
        if !task_ids.insert(task.id) {
            return Err(CrawlError::Config(format!("duplicate task id {}", task.id)));
        }
        if !ids.contains(&task.datasource_id) {
            return Err(CrawlError::Config(format!(
                "task '{}' references unknown datasource {}",
                task.name, task.datasource_id
            )));
        }
    }

    Ok(())
}

/// Validate one datasource descriptor.
pub fn validate_datasource(ds: &DataSourceDescriptor) -> Result<()> {
    let label = if ds.name.is_empty() {
        format!("datasources[{}]", ds.id)
    } else {
        format!("datasource '{}'", ds.name)
    };

    if ds.host.trim().is_empty() {
        return Err(CrawlError::Config(format!("{}: host is required", label)));
    }
    if ds.port == Some(0) {
        return Err(CrawlError::Config(format!(
            "{}: port must be between 1 and 65535",
            label
        )));
    }
    if ds.username.trim().is_empty() {
        return Err(CrawlError::Config(format!("{}: username is required", label)));
    }
    if ds.password.is_empty() {
        return Err(CrawlError::Config(format!("{}: password is required", label)));
    }
    if ds.database.trim().is_empty() {
        return Err(CrawlError::Config(format!("{}: database is required", label)));
    }
    if ds.kind == DialectKind::Oracle && ds.database.len() > MAX_ORACLE_SERVICE_NAME {
        return Err(CrawlError::Config(format!(
            "{}: Oracle service name must be at most {} characters",
            label, MAX_ORACLE_SERVICE_NAME
        )));
    }

    Ok(())
}
