//! Synonym groups linking CO column vocabulary to Salesforce field vocabulary

use crate::fuzzy_matcher::FuzzyMatcher;
use lazy_static::lazy_static;
use std::collections::HashMap;

const SYNONYM_GROUPS: &[&[&str]] = &[
    &["surname", "last name", "family name"],
    &["given names", "given name", "first name", "forename"],
    &["date of birth", "dob", "birthdate", "birth date"],
    &["postcode", "post code", "postal code", "zip", "billing postal code", "mailing postal code"],
    &["suburb", "city", "town", "locality", "billing city", "mailing city"],
    &["street address", "address line", "street", "billing street", "mailing street"],
    &["state", "billing state", "mailing state"],
    &["mobile", "mobile number", "mobile phone", "mobile no"],
    &["phone", "phone number", "telephone", "phone no"],
    &["email", "email address", "e mail"],
    &["abn", "australian business number"],
    &["acn", "australian company number"],
    &["trading name", "business name"],
    &["customer name", "legal name", "account name", "employer name"],
    &["gender", "sex"],
    &["notes", "comments", "remarks"],
    &["received date", "lodged date", "lodgement date", "date received"],
    &["total wages", "gross wages", "wages"],
    &["total hours", "hours worked", "hours"],
    &["worker count", "number of workers", "headcount"],
    &["registration date", "registered date", "date registered"],
];

lazy_static! {
    static ref SYNONYM_INDEX: HashMap<String, usize> = {
        let matcher = FuzzyMatcher::default();
        let mut index = HashMap::new();
        for (group, phrases) in SYNONYM_GROUPS.iter().enumerate() {
            for phrase in phrases.iter() {
                index.insert(compact(&matcher, phrase), group);
            }
        }
        index
    };
}

fn compact(matcher: &FuzzyMatcher, name: &str) -> String {
    matcher.normalize_identifier(name).replace(' ', "")
}

/// Index of the synonym group an identifier belongs to.
pub fn synonym_group(matcher: &FuzzyMatcher, name: &str) -> Option<usize> {
    SYNONYM_INDEX.get(&compact(matcher, name)).copied()
}

/// Whether both identifiers fall into the same synonym group.
pub fn are_synonyms(matcher: &FuzzyMatcher, a: &str, b: &str) -> bool {
    match (synonym_group(matcher, a), synonym_group(matcher, b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synonym_groups() {
        let m = FuzzyMatcher::default();
        assert!(are_synonyms(&m, "SURNAME", "LastName"));
        assert!(are_synonyms(&m, "GIVEN_NAMES", "FirstName"));
        assert!(are_synonyms(&m, "DATE_OF_BIRTH", "Birthdate"));
        assert!(are_synonyms(&m, "POSTCODE", "BillingPostalCode"));
        assert!(are_synonyms(&m, "SUBURB", "MailingCity"));
        assert!(are_synonyms(&m, "MOBILE_NUMBER", "MobilePhone"));
        assert!(are_synonyms(&m, "ABN", "ABN__c"));
        assert!(!are_synonyms(&m, "SURNAME", "FirstName"));
        assert!(!are_synonyms(&m, "WORKER_STATUS_CODE", "Phone"));
    }
}
