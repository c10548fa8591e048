//! CO_CODE lookups and Salesforce picklist resolution

use crate::fuzzy_matcher::FuzzyMatcher;
use crate::record::{self, Record};
use std::collections::HashMap;

pub const CODE_TABLE_SQL: &str = "SELECT CODE_TYPE, CODE, DESCRIPTION FROM CO_CODE ORDER BY CODE_TYPE, CODE";

/// `CO_CODE` rows keyed by (CODE_TYPE, CODE).
#[derive(Debug, Clone, Default)]
pub struct CodeTable {
    entries: HashMap<(String, String), String>,
}

impl CodeTable {
    pub fn from_records(rows: &[Record]) -> Self {
        let mut entries = HashMap::new();
        for row in rows {
            let (Some(code_type), Some(code)) = (record::text(row, "CODE_TYPE"), record::text(row, "CODE")) else {
                continue;
            };
            let description = record::text(row, "DESCRIPTION").unwrap_or_else(|| code.clone());
            entries.insert((code_type.to_ascii_uppercase(), code.to_ascii_uppercase()), description);
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn describe(&self, code_type: &str, code: &str) -> Option<&str> {
        self.entries
            .get(&(code_type.to_ascii_uppercase(), code.trim().to_ascii_uppercase()))
            .map(String::as_str)
    }

    /// All (code, description) pairs of one type, sorted by code.
    pub fn codes_of(&self, code_type: &str) -> Vec<(&str, &str)> {
        let wanted = code_type.to_ascii_uppercase();
        let mut codes: Vec<(&str, &str)> = self
            .entries
            .iter()
            .filter(|((t, _), _)| *t == wanted)
            .map(|((_, c), d)| (c.as_str(), d.as_str()))
            .collect();
        codes.sort();
        codes
    }

    pub fn code_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(|(t, _)| t.as_str()).collect();
        types.sort();
        types.dedup();
        types
    }
}

/// How a value was matched against a picklist.
#[derive(Debug, Clone, PartialEq)]
pub enum PicklistMatch {
    Exact(String),
    CaseInsensitive(String),
    Fuzzy(String, f64),
    Unresolved,
}

impl PicklistMatch {
    pub fn value(&self) -> Option<&str> {
        match self {
            PicklistMatch::Exact(v) | PicklistMatch::CaseInsensitive(v) | PicklistMatch::Fuzzy(v, _) => Some(v),
            PicklistMatch::Unresolved => None,
        }
    }
}

pub struct PicklistResolver {
    matcher: FuzzyMatcher,
}

impl Default for PicklistResolver {
    fn default() -> Self {
        Self {
            matcher: FuzzyMatcher::new(0.9),
        }
    }
}

impl PicklistResolver {
    pub fn resolve(&self, value: &str, allowed: &[String]) -> PicklistMatch {
        if let Some(v) = allowed.iter().find(|a| a.as_str() == value) {
            return PicklistMatch::Exact(v.clone());
        }
        if let Some(v) = allowed.iter().find(|a| a.eq_ignore_ascii_case(value.trim())) {
            return PicklistMatch::CaseInsensitive(v.clone());
        }
        match self.matcher.find_best_match(value, allowed) {
            Some((v, score)) => PicklistMatch::Fuzzy(v.to_string(), score),
            None => PicklistMatch::Unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codes() -> CodeTable {
        let rows: Vec<Record> = vec![
            json!({"CODE_TYPE": "GENDER", "CODE": "M", "DESCRIPTION": "Male"}),
            json!({"CODE_TYPE": "GENDER", "CODE": "F", "DESCRIPTION": "Female"}),
            json!({"CODE_TYPE": "WSR_STATUS", "CODE": "REC", "DESCRIPTION": null}),
            json!({"CODE_TYPE": null, "CODE": "X"}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();
        CodeTable::from_records(&rows)
    }

    #[test]
    fn test_code_table() {
        let table = codes();
        assert_eq!(table.len(), 3);
        assert_eq!(table.describe("gender", " m "), Some("Male"));
        assert_eq!(table.describe("WSR_STATUS", "REC"), Some("REC"));
        assert_eq!(table.describe("GENDER", "X"), None);
        assert_eq!(table.codes_of("GENDER"), vec![("F", "Female"), ("M", "Male")]);
        assert_eq!(table.code_types(), vec!["GENDER", "WSR_STATUS"]);
    }

    #[test]
    fn test_picklist_resolution_order() {
        let resolver = PicklistResolver::default();
        let allowed = vec!["Active".to_string(), "Non-Compliant".to_string()];

        assert_eq!(resolver.resolve("Active", &allowed), PicklistMatch::Exact("Active".to_string()));
        assert_eq!(
            resolver.resolve("ACTIVE", &allowed),
            PicklistMatch::CaseInsensitive("Active".to_string())
        );
        assert_eq!(resolver.resolve("Non Compliant", &allowed).value(), Some("Non-Compliant"));
        assert_eq!(resolver.resolve("Ceased", &allowed), PicklistMatch::Unresolved);
    }
}
