//! Weighted column → field score
//!
//! `total = 0.6 * name + 0.2 * dtype + 0.15 * pattern + 0.05 * synonym`,
//! every component in `[0, 1]`.

use super::patterns::ValuePattern;
use super::synonyms::are_synonyms;
use crate::fuzzy_matcher::FuzzyMatcher;
use crate::metadata::{OracleColumn, SfField, TypeFamily};
use serde::{Deserialize, Serialize};

pub const NAME_WEIGHT: f64 = 0.6;
pub const DTYPE_WEIGHT: f64 = 0.2;
pub const PATTERN_WEIGHT: f64 = 0.15;
pub const SYNONYM_WEIGHT: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub name: f64,
    pub dtype: f64,
    pub pattern: f64,
    pub synonym: f64,
    pub total: f64,
}

impl ScoreBreakdown {
    pub fn new(name: f64, dtype: f64, pattern: f64, synonym: f64) -> Self {
        let total = NAME_WEIGHT * name + DTYPE_WEIGHT * dtype + PATTERN_WEIGHT * pattern + SYNONYM_WEIGHT * synonym;
        Self {
            name,
            dtype,
            pattern,
            synonym,
            total,
        }
    }
}

/// Best similarity of the column name against the field's API name and label.
pub fn name_similarity(matcher: &FuzzyMatcher, column: &str, field: &SfField) -> f64 {
    let by_name = matcher.identifier_similarity(column, &field.name);
    let by_label = matcher.identifier_similarity(column, &field.label);
    by_name.max(by_label)
}

pub fn dtype_match(oracle: TypeFamily, salesforce: TypeFamily) -> f64 {
    use TypeFamily::*;
    if oracle == salesforce {
        return 1.0;
    }
    match (oracle, salesforce) {
        (Text, Picklist | Email | Phone | Url) => 0.5,
        (Number, Text) => 0.5,
        (Date, DateTime) | (DateTime, Date) => 0.5,
        _ => 0.0,
    }
}

/// 1.0 when the detected value pattern agrees with the field's type or name.
pub fn pattern_bonus(pattern: Option<ValuePattern>, field: &SfField) -> f64 {
    let Some(pattern) = pattern else {
        return 0.0;
    };
    let name = field.name.to_ascii_lowercase();
    let family = field.family();
    let agrees = match pattern {
        ValuePattern::Email => family == TypeFamily::Email || name.contains("email"),
        ValuePattern::Phone => {
            family == TypeFamily::Phone || name.contains("phone") || name.contains("mobile") || name.contains("fax")
        }
        ValuePattern::Date => matches!(family, TypeFamily::Date | TypeFamily::DateTime),
        ValuePattern::Abn => name.contains("abn"),
        ValuePattern::Postcode => name.contains("postalcode") || name.contains("postcode") || name.contains("zip"),
        ValuePattern::Url => family == TypeFamily::Url || name.contains("website"),
        ValuePattern::Flag => family == TypeFamily::Boolean,
        ValuePattern::Currency => field.field_type == "currency" || family == TypeFamily::Number,
    };
    if agrees {
        1.0
    } else {
        0.0
    }
}

pub fn synonym_bonus(matcher: &FuzzyMatcher, column: &str, field: &SfField) -> f64 {
    if are_synonyms(matcher, column, &field.name) || are_synonyms(matcher, column, &field.label) {
        1.0
    } else {
        0.0
    }
}

pub fn score(
    matcher: &FuzzyMatcher,
    column: &OracleColumn,
    pattern: Option<ValuePattern>,
    field: &SfField,
) -> ScoreBreakdown {
    ScoreBreakdown::new(
        name_similarity(matcher, &column.name, field),
        dtype_match(column.family(), field.family()),
        pattern_bonus(pattern, field),
        synonym_bonus(matcher, &column.name, field),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, label: &str, field_type: &str) -> SfField {
        SfField {
            name: name.to_string(),
            label: label.to_string(),
            field_type: field_type.to_string(),
            length: 80,
            nillable: true,
            createable: true,
            updateable: true,
            external_id: false,
            defaulted_on_create: false,
            restricted_picklist: false,
            picklist_values: vec![],
            reference_to: vec![],
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        let full = ScoreBreakdown::new(1.0, 1.0, 1.0, 1.0);
        assert!((full.total - 1.0).abs() < 1e-9);
        let name_only = ScoreBreakdown::new(0.5, 0.0, 0.0, 0.0);
        assert!((name_only.total - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_dtype_match() {
        assert_eq!(dtype_match(TypeFamily::Text, TypeFamily::Text), 1.0);
        assert_eq!(dtype_match(TypeFamily::Text, TypeFamily::Picklist), 0.5);
        assert_eq!(dtype_match(TypeFamily::Number, TypeFamily::Text), 0.5);
        assert_eq!(dtype_match(TypeFamily::Date, TypeFamily::DateTime), 0.5);
        assert_eq!(dtype_match(TypeFamily::Number, TypeFamily::Date), 0.0);
    }

    #[test]
    fn test_name_similarity_uses_label() {
        let m = FuzzyMatcher::default();
        let f = field("Trading_Name__c", "Trading Name", "string");
        assert!(name_similarity(&m, "TRADING_NAME", &f) > 0.99);
        let f = field("Custom_7__c", "Date of Birth", "date");
        assert!(name_similarity(&m, "DATE_OF_BIRTH", &f) > 0.99);
    }

    #[test]
    fn test_pattern_and_synonym_bonus() {
        let m = FuzzyMatcher::default();
        let email = field("Email", "Email", "email");
        assert_eq!(pattern_bonus(Some(ValuePattern::Email), &email), 1.0);
        assert_eq!(pattern_bonus(Some(ValuePattern::Phone), &email), 0.0);
        assert_eq!(pattern_bonus(None, &email), 0.0);

        let last_name = field("LastName", "Last Name", "string");
        assert_eq!(synonym_bonus(&m, "SURNAME", &last_name), 1.0);
        assert_eq!(synonym_bonus(&m, "GIVEN_NAMES", &last_name), 0.0);
    }

    #[test]
    fn test_score_combines_components() {
        let m = FuzzyMatcher::default();
        let column = OracleColumn {
            table: "CO_PERSON".to_string(),
            name: "EMAIL_ADDRESS".to_string(),
            data_type: "VARCHAR2".to_string(),
            length: Some(200),
            nullable: true,
            samples: vec![],
        };
        let s = score(&m, &column, Some(ValuePattern::Email), &field("Email", "Email", "email"));
        assert_eq!(s.dtype, 0.5);
        assert_eq!(s.pattern, 1.0);
        assert_eq!(s.synonym, 1.0);
        assert!(s.total > 0.8);
    }
}
