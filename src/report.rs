//! Run artifacts written under the output directories

use crate::config::OutputDirs;
use crate::error::Result;
use crate::record::{value_text, Record};
use chrono::Local;
use itertools::Itertools;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// `YYYYmmdd_HHMMSS` in local time, shared by every artifact of a run.
pub fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Write records with a header made of every key seen, in first-seen order.
/// Nested objects are written as compact JSON.
pub fn write_records_csv(path: &Path, records: &[Record]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let headers = record_headers(records);
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&headers)?;
    for rec in records {
        let row: Vec<String> = headers.iter().map(|h| cell(rec.get(h.as_str()))).collect();
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn record_headers(records: &[Record]) -> Vec<String> {
    records.iter().flat_map(|r| r.keys().cloned()).unique().collect()
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(v @ Value::Object(_)) | Some(v @ Value::Array(_)) => v.to_string(),
        Some(v) => value_text(v).unwrap_or_default(),
    }
}

/// Names and writes the artifacts of one run.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dirs: OutputDirs,
    timestamp: String,
}

impl ArtifactWriter {
    pub fn new(dirs: OutputDirs) -> Self {
        Self {
            dirs,
            timestamp: timestamp(),
        }
    }

    pub fn dirs(&self) -> &OutputDirs {
        &self.dirs
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// `test_output/<stem>_<ts>.<ext>`
    pub fn test_output_path(&self, stem: &str, ext: &str) -> PathBuf {
        self.dirs
            .test_output()
            .join(format!("{}_{}.{}", stem, self.timestamp, ext))
    }

    /// `error/<object>_errors_<ts>.csv`
    pub fn error_path(&self, object: &str) -> PathBuf {
        self.dirs
            .errors()
            .join(format!("{}_errors_{}.csv", object, self.timestamp))
    }

    /// `mappings/<stem>.<ext>`
    pub fn mapping_path(&self, stem: &str, ext: &str) -> PathBuf {
        self.dirs.mappings().join(format!("{}.{}", stem, ext))
    }

    /// `test_output/extracts/<TABLE>.csv`, replayable through `CsvSource`.
    pub fn extract_path(&self, table: &str) -> PathBuf {
        self.dirs
            .test_output()
            .join("extracts")
            .join(format!("{}.csv", table.to_uppercase()))
    }

    pub fn write_rows<T: Serialize>(&self, path: PathBuf, rows: &[T]) -> Result<PathBuf> {
        write_csv(&path, rows)?;
        info!("Wrote {} rows to {}", rows.len(), path.display());
        Ok(path)
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, path: PathBuf, value: &T) -> Result<PathBuf> {
        write_json(&path, value)?;
        info!("Wrote {}", path.display());
        Ok(path)
    }

    pub fn write_records(&self, path: PathBuf, records: &[Record]) -> Result<PathBuf> {
        write_records_csv(&path, records)?;
        info!("Wrote {} records to {}", records.len(), path.display());
        Ok(path)
    }
}
