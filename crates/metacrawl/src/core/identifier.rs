//! Identifier validation and quoting for dynamically built catalog queries.
//!
//! Table names can't be bound as parameters, so `COUNT(*)` probes and
//! `SHOW DATA` statements splice them into SQL text. Every name goes through
//! [`validate_identifier`] and dialect-specific quoting first.

use crate::error::{CrawlError, Result};

/// Maximum identifier length (conservative limit across dialects).
/// - PostgreSQL: 63 bytes
/// - SQL Server: 128 characters
/// - MySQL / StarRocks: 64 characters
/// - Oracle: 128 bytes (12.2+)
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Reject empty identifiers, null bytes and over-long names.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CrawlError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(CrawlError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(CrawlError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote with backticks (MySQL, StarRocks).
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Quote with double quotes (PostgreSQL, Oracle).
pub fn quote_ansi(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote with brackets (SQL Server).
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

pub fn qualify_mysql(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_mysql(schema)?, quote_mysql(table)?))
}

pub fn qualify_ansi(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_ansi(schema)?, quote_ansi(table)?))
}

pub fn qualify_mssql(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_mssql(schema)?, quote_mssql(table)?))
}

/// Escape a string literal for drivers without parameter binding.
///
/// Doubles single quotes and rejects null bytes.
pub fn escape_literal(value: &str) -> Result<String> {
    if value.contains('\0') {
        return Err(CrawlError::Config(format!(
            "Literal contains null byte: {:?}",
            value
        )));
    }
    Ok(value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_mysql_escapes_backticks() {
        assert_eq!(quote_mysql("orders").unwrap(), "`orders`");
        assert_eq!(quote_mysql("we`ird").unwrap(), "`we``ird`");
    }

    #[test]
    fn test_quote_ansi_escapes_double_quotes() {
        assert_eq!(quote_ansi("orders").unwrap(), "\"orders\"");
        assert_eq!(quote_ansi("a\"b").unwrap(), "\"a\"\"b\"");
    }

    #[test]
    fn test_quote_mssql_escapes_brackets() {
        assert_eq!(quote_mssql("orders").unwrap(), "[orders]");
        assert_eq!(quote_mssql("a]b").unwrap(), "[a]]b]");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify_mysql("shop", "orders").unwrap(), "`shop`.`orders`");
        assert_eq!(qualify_ansi("public", "orders").unwrap(), "\"public\".\"orders\"");
        assert_eq!(qualify_mssql("dbo", "orders").unwrap(), "[dbo].[orders]");
    }

    #[test]
    fn test_rejects_bad_identifiers() {
        assert!(quote_mysql("").is_err());
        assert!(quote_ansi("a\0b").is_err());
        assert!(quote_mssql(&"x".repeat(129)).is_err());
        assert!(quote_mssql(&"x".repeat(128)).is_ok());
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal("O'Brien").unwrap(), "O''Brien");
        assert!(escape_literal("a\0").is_err());
    }
}
