//! CSV source - replays extracts written by earlier runs

use super::{driving_table, SourceDatabase};
use crate::error::{MigrationError, Result};
use crate::record::Record;
use async_trait::async_trait;
use csv::ReaderBuilder;
use serde_json::Value;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serves `<dir>/<TABLE>.csv` for any query whose driving table is `TABLE`.
pub struct CsvSource {
    dir: PathBuf,
}

impl CsvSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read every row of a single CSV file.
    pub fn read_file(path: &Path) -> Result<Vec<Record>> {
        let file = fs::File::open(path).map_err(|e| {
            MigrationError::Config(format!("Cannot open extract {}: {}", path.display(), e))
        })?;
        Self::read_from(file)
    }

    pub fn read_from<R: Read>(reader: R) -> Result<Vec<Record>> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        let mut out = Vec::new();
        for result in rdr.records() {
            let row = result?;
            let mut rec = Record::new();
            for (idx, header) in headers.iter().enumerate() {
                let cell = row.get(idx).unwrap_or("");
                rec.insert(header.clone(), coerce_cell(cell));
            }
            out.push(rec);
        }

        Ok(out)
    }
}

#[async_trait]
impl SourceDatabase for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    async fn query(&self, sql: &str) -> Result<Vec<Record>> {
        let table = driving_table(sql).ok_or_else(|| {
            MigrationError::Config(format!("Cannot find a driving table in query: {}", sql))
        })?;
        let path = self.dir.join(format!("{}.csv", table));
        debug!("Replaying {} from {}", table, path.display());
        Self::read_file(&path)
    }
}

/// Numbers and booleans are restored from text. Values with a leading zero
/// (phone numbers, NT postcodes) and integers too wide for i64 stay text.
fn coerce_cell(s: &str) -> Value {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }

    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    let leading_zero = trimmed.len() > 1 && trimmed.starts_with('0') && !trimmed.starts_with("0.");
    if !leading_zero {
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Number(i.into());
        }
        // integers past i64 are identifiers, not quantities
        if !trimmed.contains(['.', 'e', 'E']) {
            return Value::String(trimmed.to_string());
        }

        if let Ok(f) = trimmed.parse::<f64>() {
            if let Some(n) = serde_json::Number::from_f64(f) {
                return Value::Number(n);
            }
        }
    }

    Value::String(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_cell() {
        assert_eq!(coerce_cell(""), Value::Null);
        assert_eq!(coerce_cell("42"), json!(42));
        assert_eq!(coerce_cell("12.5"), json!(12.5));
        assert_eq!(coerce_cell("0412345678"), json!("0412345678"));
        assert_eq!(coerce_cell("0800"), json!("0800"));
        assert_eq!(coerce_cell("TRUE"), json!(true));
        assert_eq!(coerce_cell(" Acme "), json!("Acme"));
        assert_eq!(coerce_cell("1.5e3"), json!(1500.0));
    }

    #[test]
    fn test_oversized_integer_stays_text() {
        assert_eq!(coerce_cell("12345678901234567890"), json!("12345678901234567890"));
        assert_eq!(coerce_cell("-98765432109876543210"), json!("-98765432109876543210"));
        assert_eq!(coerce_cell("9223372036854775807"), json!(9223372036854775807i64));
    }

    #[test]
    fn test_read_from() {
        let data = "CUSTOMER_ID,CUSTOMER_NAME,POSTCODE\n10,Acme Pty Ltd,0870\n11,,2000\n";
        let rows = CsvSource::read_from(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["CUSTOMER_ID"], json!(10));
        assert_eq!(rows[0]["POSTCODE"], json!("0870"));
        assert_eq!(rows[1]["CUSTOMER_NAME"], Value::Null);
    }

    #[tokio::test]
    async fn test_query_uses_driving_table() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("CO_CODE.csv"), "CODE_TYPE,CODE,DESCRIPTION\nGENDER,M,Male\n").unwrap();

        let source = CsvSource::new(dir.path());
        let rows = source
            .query("SELECT CODE_TYPE, CODE, DESCRIPTION FROM CO_CODE")
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["DESCRIPTION"], json!("Male"));

        assert!(source.query("SELECT * FROM CO_WSR").await.is_err());
    }
}
