use crate::error::{MigrationError, Result};
use crate::metadata::{SObjectSchema, TypeFamily};
use crate::record::{value_text, Record};
use crate::salesforce::EXTERNAL_ID_FIELD;
use crate::transform::MigrationObject;
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

pub const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+'-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$";

/// Pre-load checks applied to transformed records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ValidationRule {
    /// Field (or its relationship reference) must be populated.
    Required { field: String },

    /// Text value must fit the field length.
    MaxLength { field: String, max: usize },

    /// Value must be one of the active picklist entries.
    Picklist { field: String, values: Vec<String> },

    /// Value must match a regular expression.
    Pattern { field: String, pattern: String },

    /// No two records may share a value.
    Unique { field: String },
}

impl ValidationRule {
    pub fn field(&self) -> &str {
        match self {
            ValidationRule::Required { field }
            | ValidationRule::MaxLength { field, .. }
            | ValidationRule::Picklist { field, .. }
            | ValidationRule::Pattern { field, .. }
            | ValidationRule::Unique { field } => field,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ValidationRule::Required { .. } => "required",
            ValidationRule::MaxLength { .. } => "max_length",
            ValidationRule::Picklist { .. } => "picklist",
            ValidationRule::Pattern { .. } => "pattern",
            ValidationRule::Unique { .. } => "unique",
        }
    }
}

impl std::fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationRule::MaxLength { field, max } => write!(f, "{} {} ({})", self.kind(), field, max),
            ValidationRule::Picklist { field, values } => {
                write!(f, "{} {} ({} values)", self.kind(), field, values.len())
            }
            _ => write!(f, "{} {}", self.kind(), self.field()),
        }
    }
}

/// `AccountId` → `Account`, `Account__c` → `Account__r`.
pub fn relationship_name(field: &str) -> Option<String> {
    if let Some(stem) = field.strip_suffix("__c") {
        return Some(format!("{}__r", stem));
    }
    field
        .strip_suffix("Id")
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}

/// Rules derived from an object describe.
pub fn rules_from_schema(schema: &SObjectSchema) -> Vec<ValidationRule> {
    let mut rules = vec![ValidationRule::Unique {
        field: EXTERNAL_ID_FIELD.to_string(),
    }];

    for field in schema.createable_fields() {
        if field.is_required() {
            rules.push(ValidationRule::Required {
                field: field.name.clone(),
            });
        }
        let family = field.family();
        if matches!(family, TypeFamily::Text | TypeFamily::Email | TypeFamily::Phone | TypeFamily::Url)
            && field.length > 0
        {
            rules.push(ValidationRule::MaxLength {
                field: field.name.clone(),
                max: field.length as usize,
            });
        }
        if family == TypeFamily::Picklist && field.restricted_picklist && !field.picklist_values.is_empty() {
            rules.push(ValidationRule::Picklist {
                field: field.name.clone(),
                values: field.picklist_values.clone(),
            });
        }
        if family == TypeFamily::Email {
            rules.push(ValidationRule::Pattern {
                field: field.name.clone(),
                pattern: EMAIL_PATTERN.to_string(),
            });
        }
    }
    rules
}

/// Rules that hold without a describe.
pub fn baseline_rules(object: MigrationObject) -> Vec<ValidationRule> {
    let required: &[&str] = match object {
        MigrationObject::Account => &["Name"],
        MigrationObject::Contact => &["LastName"],
        MigrationObject::Return => &["Name", "Account__c"],
        MigrationObject::ServiceReport => &["Account__c"],
    };
    let mut rules = vec![ValidationRule::Unique {
        field: EXTERNAL_ID_FIELD.to_string(),
    }];
    rules.extend(required.iter().map(|f| ValidationRule::Required { field: f.to_string() }));
    if object == MigrationObject::Contact {
        rules.push(ValidationRule::Pattern {
            field: "Email".to_string(),
            pattern: EMAIL_PATTERN.to_string(),
        });
    }
    rules
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleOutcome {
    pub rule: ValidationRule,
    /// External ids of violating records.
    pub violations: Vec<String>,
}

/// Null rate and cardinality of one field across the batch.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldProfile {
    pub field: String,
    pub null_count: usize,
    pub null_percentage: f64,
    pub distinct_count: usize,
}

/// One line of the pre-load CSV.
#[derive(Debug, Clone, Serialize)]
pub struct ViolationRow {
    pub rule: String,
    pub field: String,
    pub external_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub object: String,
    pub total_records: usize,
    pub failing_records: usize,
    pub pass_rate: f64,
    pub outcomes: Vec<RuleOutcome>,
    pub profile: Vec<FieldProfile>,
}

impl ValidationReport {
    pub fn violations_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.violations.len()).sum()
    }

    pub fn passed(&self) -> bool {
        self.violations_count() == 0
    }

    pub fn failing_ids(&self) -> HashSet<&str> {
        self.outcomes
            .iter()
            .flat_map(|o| o.violations.iter().map(String::as_str))
            .collect()
    }

    pub fn rows(&self) -> Vec<ViolationRow> {
        self.outcomes
            .iter()
            .flat_map(|o| {
                o.violations.iter().map(move |id| ViolationRow {
                    rule: o.rule.kind().to_string(),
                    field: o.rule.field().to_string(),
                    external_id: id.clone(),
                })
            })
            .collect()
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", "=".repeat(80))?;
        writeln!(f, " PRE-LOAD VALIDATION: {}", self.object)?;
        writeln!(f, "{}\n", "=".repeat(80))?;

        writeln!(f, "{}", "-".repeat(80))?;
        writeln!(f, " SUMMARY")?;
        writeln!(f, "{}", "-".repeat(80))?;
        writeln!(f, "Total Records Checked: {}", self.total_records)?;
        writeln!(f, "Records Failing: {}", self.failing_records)?;
        writeln!(f, "Violations Found: {}", self.violations_count())?;
        writeln!(f, "Pass Rate: {:.2}%", self.pass_rate * 100.0)?;

        writeln!(f, "\n{}", "-".repeat(80))?;
        writeln!(f, " RULES")?;
        writeln!(f, "{}", "-".repeat(80))?;
        for outcome in &self.outcomes {
            let status = if outcome.violations.is_empty() { "✅" } else { "❌" };
            writeln!(f, "{} {:<50} {:>8}", status, outcome.rule.to_string(), outcome.violations.len())?;
            for id in outcome.violations.iter().take(5) {
                writeln!(f, "     - {}", id)?;
            }
            if outcome.violations.len() > 5 {
                writeln!(f, "     ... and {} more", outcome.violations.len() - 5)?;
            }
        }

        if !self.profile.is_empty() {
            writeln!(f, "\n{}", "-".repeat(80))?;
            writeln!(f, " FIELD PROFILE")?;
            writeln!(f, "{}", "-".repeat(80))?;
            writeln!(f, "{:<40} {:>10} {:>10}", "FIELD", "NULL %", "DISTINCT")?;
            for p in &self.profile {
                writeln!(f, "{:<40} {:>9.1}% {:>10}", p.field, p.null_percentage * 100.0, p.distinct_count)?;
            }
        }

        writeln!(f, "\n{}", "=".repeat(80))?;
        Ok(())
    }
}

/// Runs a rule set over transformed records.
pub struct Validator {
    rules: Vec<ValidationRule>,
}

impl Validator {
    pub fn new(rules: Vec<ValidationRule>) -> Self {
        Self { rules }
    }

    /// Describe-derived rules when a schema is known, the baseline otherwise.
    pub fn for_object(object: MigrationObject, schema: Option<&SObjectSchema>) -> Self {
        match schema {
            Some(s) => Self::new(rules_from_schema(s)),
            None => Self::new(baseline_rules(object)),
        }
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    pub fn validate(&self, object: &str, records: &[Record]) -> Result<ValidationReport> {
        let df = records_to_frame(records)?;
        let ids: Vec<String> = records
            .iter()
            .enumerate()
            .map(|(i, r)| external_id(r).unwrap_or_else(|| format!("row {}", i + 1)))
            .collect();

        let mut outcomes = Vec::with_capacity(self.rules.len());
        let mut failing: BTreeSet<usize> = BTreeSet::new();
        for rule in &self.rules {
            let rows: Vec<usize> = match rule {
                ValidationRule::Unique { field } => duplicate_rows(&df, field, records)?,
                _ => {
                    let check = RowCheck::compile(rule)?;
                    records
                        .iter()
                        .enumerate()
                        .filter(|(_, rec)| !check.passes(rec))
                        .map(|(i, _)| i)
                        .collect()
                }
            };
            debug!("{}: {} violations", rule, rows.len());
            failing.extend(rows.iter().copied());
            outcomes.push(RuleOutcome {
                rule: rule.clone(),
                violations: rows.iter().map(|&i| ids[i].clone()).collect(),
            });
        }

        let failing_records = failing.len();
        let pass_rate = if records.is_empty() {
            1.0
        } else {
            1.0 - failing_records as f64 / records.len() as f64
        };

        let report = ValidationReport {
            object: object.to_string(),
            total_records: records.len(),
            failing_records,
            pass_rate,
            outcomes,
            profile: profile_frame(&df)?,
        };
        info!(
            "{}: {} records validated, {} failing ({:.1}% pass)",
            object,
            report.total_records,
            report.failing_records,
            report.pass_rate * 100.0
        );
        Ok(report)
    }
}

/// Per-record form of the value rules.
enum RowCheck<'a> {
    Required(&'a str, Option<String>),
    MaxLength(&'a str, usize),
    Picklist(&'a str, &'a [String]),
    Pattern(&'a str, Regex),
}

impl<'a> RowCheck<'a> {
    fn compile(rule: &'a ValidationRule) -> Result<Self> {
        Ok(match rule {
            ValidationRule::Required { field } => RowCheck::Required(field, relationship_name(field)),
            ValidationRule::MaxLength { field, max } => RowCheck::MaxLength(field, *max),
            ValidationRule::Picklist { field, values } => RowCheck::Picklist(field, values),
            ValidationRule::Pattern { field, pattern } => RowCheck::Pattern(
                field,
                Regex::new(pattern)
                    .map_err(|e| MigrationError::Validation(format!("Invalid pattern for {}: {}", field, e)))?,
            ),
            ValidationRule::Unique { field } => {
                return Err(MigrationError::Validation(format!(
                    "uniqueness on {} is checked across records",
                    field
                )))
            }
        })
    }

    fn passes(&self, rec: &Record) -> bool {
        match self {
            RowCheck::Required(field, relationship) => {
                populated(rec.get(*field)) || relationship.as_deref().is_some_and(|r| populated(rec.get(r)))
            }
            RowCheck::MaxLength(field, max) => match rec.get(*field) {
                Some(Value::String(s)) => s.chars().count() <= *max,
                _ => true,
            },
            RowCheck::Picklist(field, values) => match rec.get(*field).and_then(value_text) {
                Some(v) => values.iter().any(|allowed| *allowed == v),
                None => true,
            },
            RowCheck::Pattern(field, regex) => match rec.get(*field).and_then(value_text) {
                Some(v) => regex.is_match(&v),
                None => true,
            },
        }
    }
}

fn populated(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Object(o)) => !o.is_empty(),
        Some(v) => value_text(v).is_some(),
    }
}

fn external_id(rec: &Record) -> Option<String> {
    rec.get(EXTERNAL_ID_FIELD).and_then(value_text)
}

/// One string column per field seen; nested references become JSON text.
pub fn records_to_frame(records: &[Record]) -> Result<DataFrame> {
    let headers = crate::report::record_headers(records);
    let columns: Vec<Series> = headers
        .iter()
        .map(|h| {
            let values: Vec<Option<String>> = records
                .iter()
                .map(|r| match r.get(h.as_str()) {
                    Some(v @ Value::Object(_)) => Some(v.to_string()),
                    Some(v) => value_text(v),
                    None => None,
                })
                .collect();
            Series::new(h, values)
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Indices of records whose `field` value occurs more than once.
fn duplicate_rows(df: &DataFrame, field: &str, records: &[Record]) -> Result<Vec<usize>> {
    if df.column(field).is_err() {
        return Ok(Vec::new());
    }
    let duplicates = df
        .clone()
        .lazy()
        .filter(col(field).is_not_null())
        .group_by([col(field)])
        .agg([len().alias("_count")])
        .filter(col("_count").gt(lit(1)))
        .collect()?;

    let values: HashSet<String> = duplicates
        .column(field)?
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();

    Ok(records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.get(field).and_then(value_text).is_some_and(|v| values.contains(&v)))
        .map(|(i, _)| i)
        .collect())
}

pub fn profile_frame(df: &DataFrame) -> Result<Vec<FieldProfile>> {
    let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let mut exprs = Vec::with_capacity(names.len() * 2);
    for name in &names {
        exprs.push(col(name).null_count().cast(DataType::Int64).alias(&format!("{}__nulls", name)));
        exprs.push(
            col(name)
                .drop_nulls()
                .n_unique()
                .cast(DataType::Int64)
                .alias(&format!("{}__distinct", name)),
        );
    }
    let stats = df.clone().lazy().select(exprs).collect()?;

    let height = df.height();
    let mut profile = Vec::with_capacity(names.len());
    for name in names {
        let null_count = stats
            .column(&format!("{}__nulls", name))?
            .i64()?
            .get(0)
            .unwrap_or(0) as usize;
        let distinct_count = stats
            .column(&format!("{}__distinct", name))?
            .i64()?
            .get(0)
            .unwrap_or(0) as usize;
        profile.push(FieldProfile {
            null_percentage: if height > 0 { null_count as f64 / height as f64 } else { 0.0 },
            field: name,
            null_count,
            distinct_count,
        });
    }
    Ok(profile)
}
