use crate::error::Result;
use crate::record::{value_text, Record};
use crate::salesforce::EXTERNAL_ID_FIELD;
use lazy_static::lazy_static;
use polars::prelude::*;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

lazy_static! {
    static ref ISO_DATETIME: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").unwrap();
    static ref NUMERIC: Regex = Regex::new(r"^-?\d+(\.\d+)?$").unwrap();
}

/// Compares what was extracted and transformed against what Salesforce holds.
pub struct DiffEngine;

impl DiffEngine {
    pub fn compare(&self, expected: &[Record], actual: &[Record], fields: &[String]) -> Result<ComparisonResult> {
        let population_diff = self.population_diff(&external_ids(expected), &external_ids(actual))?;
        let data_diff = self.data_diff(expected, actual, fields);
        Ok(ComparisonResult {
            population_diff,
            data_diff,
        })
    }

    /// Key population diff between the source ids and the `External_Id__c` values in Salesforce.
    pub fn population_diff(&self, source_keys: &[String], sf_keys: &[String]) -> Result<PopulationDiff> {
        let keys_a: HashSet<&str> = source_keys.iter().map(String::as_str).collect();
        let keys_b: HashSet<&str> = sf_keys.iter().map(String::as_str).collect();

        let mut missing_in_sf: Vec<String> = keys_a.difference(&keys_b).map(|k| k.to_string()).collect();
        let mut extra_in_sf: Vec<String> = keys_b.difference(&keys_a).map(|k| k.to_string()).collect();
        missing_in_sf.sort();
        extra_in_sf.sort();

        Ok(PopulationDiff {
            missing_in_sf,
            extra_in_sf,
            common_count: keys_a.intersection(&keys_b).count(),
            duplicates_in_source: self.find_duplicates(source_keys)?,
            duplicates_in_sf: self.find_duplicates(sf_keys)?,
        })
    }

    /// Field-level diff on records present on both sides. Relationship
    /// references are skipped since Salesforce returns the resolved Id, and
    /// so are fields the expected record does not carry: an absent key leaves
    /// the Salesforce value untouched on upsert.
    pub fn data_diff(&self, expected: &[Record], actual: &[Record], fields: &[String]) -> DataDiff {
        let actual_by_id: HashMap<String, &Record> = actual
            .iter()
            .filter_map(|r| Some((r.get(EXTERNAL_ID_FIELD).and_then(value_text)?, r)))
            .collect();

        let mut diff = DataDiff::default();
        for rec in expected {
            let Some(id) = rec.get(EXTERNAL_ID_FIELD).and_then(value_text) else {
                continue;
            };
            let Some(sf) = actual_by_id.get(&id) else {
                diff.missing_records += 1;
                continue;
            };
            diff.compared_records += 1;

            for field in fields.iter().filter(|f| !is_reference_field(f)) {
                let want = rec.get(field.as_str());
                let got = sf.get(field.as_str());
                if matches!(want, Some(Value::Object(_))) || matches!(got, Some(Value::Object(_))) {
                    continue;
                }
                let Some(want) = want.and_then(normalize_value) else {
                    continue;
                };
                let got = got.and_then(normalize_value);
                if got.as_deref() == Some(want.as_str()) {
                    diff.matches += 1;
                } else {
                    diff.mismatches.push(FieldMismatch {
                        external_id: id.clone(),
                        field: field.clone(),
                        expected: want,
                        actual: got.unwrap_or_default(),
                    });
                }
            }
        }
        diff
    }

    fn find_duplicates(&self, keys: &[String]) -> Result<Vec<String>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let df = DataFrame::new(vec![Series::new("key", keys)])?;
        let duplicates = df
            .lazy()
            .group_by([col("key")])
            .agg([len().alias("count")])
            .filter(col("count").gt(lit(1)))
            .collect()?;

        let mut dup_keys: Vec<String> = duplicates
            .column("key")?
            .str()?
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        dup_keys.sort();
        Ok(dup_keys)
    }
}

/// `Parent__r` relationships and the `Id` lookups Salesforce resolves them into.
pub fn is_reference_field(field: &str) -> bool {
    field.ends_with("__r") || field.ends_with("Id")
}

pub fn external_ids(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.get(EXTERNAL_ID_FIELD).and_then(value_text))
        .collect()
}

/// Canonical text for comparison: datetimes to the second, numbers without
/// trailing zeros, everything else trimmed.
pub fn normalize_value(value: &Value) -> Option<String> {
    let text = value_text(value)?;
    if ISO_DATETIME.is_match(&text) {
        return Some(text[..19].to_string());
    }
    if NUMERIC.is_match(&text) && !(text.starts_with('0') && text.len() > 1 && !text.starts_with("0.")) {
        if let Ok(n) = text.parse::<f64>() {
            return Some(format!("{}", n));
        }
    }
    Some(text)
}

#[derive(Debug, Clone)]
pub struct ComparisonResult {
    pub population_diff: PopulationDiff,
    pub data_diff: DataDiff,
}

impl ComparisonResult {
    pub fn is_clean(&self) -> bool {
        self.population_diff.missing_in_sf.is_empty()
            && self.population_diff.duplicates_in_sf.is_empty()
            && self.data_diff.mismatches.is_empty()
    }

    pub fn rows(&self) -> Vec<DiffRow> {
        let p = &self.population_diff;
        let keyed = |category: &str, ids: &[String]| -> Vec<DiffRow> {
            ids.iter()
                .map(|id| DiffRow {
                    category: category.to_string(),
                    external_id: id.clone(),
                    field: String::new(),
                    expected: String::new(),
                    actual: String::new(),
                })
                .collect()
        };
        let mut rows = keyed("missing_in_sf", &p.missing_in_sf);
        rows.extend(keyed("extra_in_sf", &p.extra_in_sf));
        rows.extend(keyed("duplicate_in_sf", &p.duplicates_in_sf));
        rows.extend(self.data_diff.mismatches.iter().map(|m| DiffRow {
            category: "field_mismatch".to_string(),
            external_id: m.external_id.clone(),
            field: m.field.clone(),
            expected: m.expected.clone(),
            actual: m.actual.clone(),
        }));
        rows
    }
}

impl std::fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let p = &self.population_diff;
        let d = &self.data_diff;
        writeln!(f, "{}", "=".repeat(80))?;
        writeln!(f, " RECONCILIATION")?;
        writeln!(f, "{}\n", "=".repeat(80))?;
        writeln!(f, "Common keys:        {}", p.common_count)?;
        writeln!(f, "Missing in SF:      {}", p.missing_in_sf.len())?;
        writeln!(f, "Extra in SF:        {}", p.extra_in_sf.len())?;
        writeln!(f, "Duplicates in SF:   {}", p.duplicates_in_sf.len())?;
        writeln!(f, "Duplicates in source: {}", p.duplicates_in_source.len())?;

        writeln!(f, "\n{}", "-".repeat(80))?;
        writeln!(f, " FIELD DIFF ({} records compared)", d.compared_records)?;
        writeln!(f, "{}", "-".repeat(80))?;
        writeln!(f, "Matching values:    {}", d.matches)?;
        writeln!(f, "Mismatched values:  {}", d.mismatches.len())?;
        for m in d.mismatches.iter().take(20) {
            writeln!(f, "  {} {}: '{}' vs '{}'", m.external_id, m.field, m.expected, m.actual)?;
        }
        if d.mismatches.len() > 20 {
            writeln!(f, "  ... and {} more", d.mismatches.len() - 20)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PopulationDiff {
    pub missing_in_sf: Vec<String>,
    pub extra_in_sf: Vec<String>,
    pub common_count: usize,
    pub duplicates_in_source: Vec<String>,
    pub duplicates_in_sf: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DataDiff {
    pub compared_records: usize,
    pub missing_records: usize,
    pub matches: usize,
    pub mismatches: Vec<FieldMismatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMismatch {
    pub external_id: String,
    pub field: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiffRow {
    pub category: String,
    pub external_id: String,
    pub field: String,
    pub expected: String,
    pub actual: String,
}
