//! Source database abstraction
//!
//! Implementations:
//! - OracleSource: the CO schema
//! - AbrSource: ABR enrichment table on SQL Server
//! - CsvSource: replay of previously written extracts

pub mod abr;
pub mod csv;
pub mod oracle;

pub use self::abr::{AbrEntry, AbrSource};
pub use self::csv::CsvSource;
pub use self::oracle::OracleSource;

use crate::error::{MigrationError, Result};
use crate::record::Record;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_$#]*(\.[A-Za-z][A-Za-z0-9_$#]*)?$").unwrap();
    static ref DRIVING_TABLE: Regex = Regex::new(r"(?i)\bFROM\s+([A-Za-z0-9_$#\.]+)").unwrap();
}

#[async_trait]
pub trait SourceDatabase: Send + Sync {
    /// Short name used in logs and reports ("oracle", "abr", "csv")
    fn name(&self) -> &str;

    /// Run a query and return every row
    async fn query(&self, sql: &str) -> Result<Vec<Record>>;
}

/// Quote a string as a SQL literal.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Comma separated literal list for an `IN (...)` clause.
pub fn in_list<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| sql_literal(v.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reject anything that is not a plain (optionally schema qualified) identifier.
pub fn ensure_identifier(name: &str) -> Result<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(MigrationError::Config(format!("Not a valid table or column name: {}", name)))
    }
}

/// First table after `FROM`, without schema prefix.
pub fn driving_table(sql: &str) -> Option<String> {
    let captured = DRIVING_TABLE.captures(sql)?.get(1)?.as_str();
    captured.rsplit('.').next().map(|t| t.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_literal_escapes_quotes() {
        assert_eq!(sql_literal("O'Brien"), "'O''Brien'");
        assert_eq!(in_list(&["1", "2"]), "'1', '2'");
    }

    #[test]
    fn test_ensure_identifier() {
        assert!(ensure_identifier("CO_PERSON").is_ok());
        assert!(ensure_identifier("CO.CO_PERSON").is_ok());
        assert!(ensure_identifier("CO_PERSON; DROP TABLE X").is_err());
    }

    #[test]
    fn test_driving_table() {
        let sql = "SELECT e.* FROM co.CO_EMPLOYER e JOIN CO_CUSTOMER c ON 1=1";
        assert_eq!(driving_table(sql).as_deref(), Some("CO_EMPLOYER"));
        assert_eq!(driving_table("SELECT 1"), None);
    }
}
