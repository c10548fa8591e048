//! SIT smoke checks against a loaded sandbox

use crate::error::Result;
use crate::record::{value_text, Record};
use crate::salesforce::{SalesforceClient, EXTERNAL_ID_FIELD};
use crate::transform::MigrationObject;
use crate::validation::{baseline_rules, relationship_name, ValidationRule};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Minimum population rate for fields every record must carry.
pub const REQUIRED_POPULATION: f64 = 0.9;
/// Minimum population rate for fields that are only expected on some records.
pub const OPTIONAL_POPULATION: f64 = 0.01;
pub const DEFAULT_SAMPLE_SIZE: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct SitCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SitReport {
    pub object: String,
    pub checks: Vec<SitCheck>,
}

impl SitReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }
}

impl std::fmt::Display for SitReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", "=".repeat(70))?;
        writeln!(f, "🧪 SIT checks: {}", self.object)?;
        writeln!(f, "{}", "=".repeat(70))?;
        for check in &self.checks {
            let mark = if check.passed { "✅ PASS" } else { "❌ FAIL" };
            writeln!(f, "{}  {:<40} {}", mark, check.name, check.detail)?;
        }
        writeln!(f, "{}", "=".repeat(70))?;
        if self.passed() {
            writeln!(f, "✅ All {} checks passed", self.checks.len())
        } else {
            writeln!(f, "❌ {} of {} checks failed", self.failures(), self.checks.len())
        }
    }
}

pub fn count_check(actual: u64, expected: u64) -> SitCheck {
    SitCheck {
        name: "record count".to_string(),
        passed: actual >= expected,
        detail: format!("{} records (expected at least {})", actual, expected),
    }
}

/// Share of records with a value in `field`, or in its relationship when the
/// sample was queried with `Parent.External_Id__c`.
pub fn population_rate(records: &[Record], field: &str) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let relationship = relationship_name(field);
    let populated = records
        .iter()
        .filter(|r| {
            has_value(r.get(field)) || relationship.as_deref().is_some_and(|rel| has_value(r.get(rel)))
        })
        .count();
    populated as f64 / records.len() as f64
}

fn has_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Object(o)) => o.values().any(|v| value_text(v).is_some()),
        Some(v) => value_text(v).is_some(),
    }
}

pub fn population_checks(records: &[Record], fields: &[&str], required: &[String]) -> Vec<SitCheck> {
    fields
        .iter()
        .map(|field| {
            let is_required = required.iter().any(|r| r == field);
            let threshold = if is_required { REQUIRED_POPULATION } else { OPTIONAL_POPULATION };
            let rate = population_rate(records, field);
            SitCheck {
                name: format!("{} populated", field),
                passed: !records.is_empty() && rate >= threshold,
                detail: format!(
                    "{:.1}% of {} sampled (min {:.0}%{})",
                    rate * 100.0,
                    records.len(),
                    threshold * 100.0,
                    if is_required { ", required" } else { "" }
                ),
            }
        })
        .collect()
}

/// Fields the object must always carry.
pub fn required_fields(object: MigrationObject) -> Vec<String> {
    baseline_rules(object)
        .into_iter()
        .filter_map(|rule| match rule {
            ValidationRule::Required { field } => Some(field),
            _ => None,
        })
        .collect()
}

pub fn sample_soql(object: MigrationObject, sample: usize) -> String {
    format!(
        "SELECT {}, {} FROM {} WHERE {} != null LIMIT {}",
        EXTERNAL_ID_FIELD,
        object.key_fields().join(", "),
        object.sobject(),
        EXTERNAL_ID_FIELD,
        sample
    )
}

pub async fn run(
    client: &SalesforceClient,
    object: MigrationObject,
    expected: u64,
    sample: usize,
) -> Result<SitReport> {
    let where_clause = format!("{} != null", EXTERNAL_ID_FIELD);
    let total = client.count(object.sobject(), Some(&where_clause)).await?;
    info!("{}: {} migrated records in Salesforce", object, total);

    let records = client.query_all(&sample_soql(object, sample)).await?;
    Ok(evaluate(object, total, expected, &records))
}

/// Count and population checks over a sampled set of migrated records.
pub fn evaluate(object: MigrationObject, total: u64, expected: u64, records: &[Record]) -> SitReport {
    let mut checks = vec![count_check(total, expected)];
    checks.extend(population_checks(records, object.key_fields(), &required_fields(object)));
    SitReport {
        object: object.sobject().to_string(),
        checks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(values: Vec<serde_json::Value>) -> Vec<Record> {
        values.into_iter().map(|v| v.as_object().cloned().unwrap()).collect()
    }

    #[test]
    fn test_count_check() {
        assert!(count_check(120, 100).passed);
        assert!(count_check(100, 100).passed);
        assert!(!count_check(99, 100).passed);
    }

    #[test]
    fn test_population_checks() {
        let sample = records(vec![
            json!({"LastName": "Lee", "FirstName": "Sam", "AccountId": "001A", "Birthdate": null}),
            json!({"LastName": "Ng", "FirstName": null, "AccountId": null, "Birthdate": null}),
        ]);
        let required = required_fields(MigrationObject::Contact);
        assert_eq!(required, vec!["LastName".to_string()]);

        let checks = population_checks(&sample, &["LastName", "FirstName", "Birthdate", "AccountId"], &required);
        let passed: Vec<bool> = checks.iter().map(|c| c.passed).collect();
        assert_eq!(passed, vec![true, true, false, true]);

        let report = SitReport {
            object: "Contact".to_string(),
            checks,
        };
        assert!(!report.passed());
        assert_eq!(report.failures(), 1);
        assert!(report.to_string().contains("❌ FAIL  Birthdate populated"));
    }

    #[test]
    fn test_population_through_relationship() {
        let sample = records(vec![json!({"Account__r": {"External_Id__c": "1"}}), json!({"Account__r": null})]);
        assert_eq!(population_rate(&sample, "Account__c"), 0.5);
        assert_eq!(population_rate(&[], "Account__c"), 0.0);
    }

    #[test]
    fn test_sample_soql() {
        assert_eq!(
            sample_soql(MigrationObject::Account, 50),
            "SELECT External_Id__c, Name, ABN__c, BillingPostalCode, Employer_Status__c FROM Account \
WHERE External_Id__c != null LIMIT 50"
        );
    }
}
