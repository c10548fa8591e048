//! Value pattern detection over sampled column values

use crate::record::parse_date;
use crate::transform::clean::{abn_checksum_valid, is_valid_email};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref URL: Regex = Regex::new(r"(?i)^(https?://|www\.)[^\s]+\.[a-z]{2,}").unwrap();
    static ref PHONE: Regex = Regex::new(r"^\+?[\d\s()-]{8,18}$").unwrap();
    static ref POSTCODE: Regex = Regex::new(r"^\d{4}$").unwrap();
    static ref CURRENCY: Regex = Regex::new(r"^-?\$?\d{1,3}(,?\d{3})*\.\d{2}$").unwrap();
}

/// Share of non-null samples that must agree before a pattern is reported.
pub const PATTERN_MAJORITY: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuePattern {
    Email,
    Url,
    Abn,
    Date,
    Currency,
    Phone,
    Postcode,
    Flag,
}

impl ValuePattern {
    /// Detection order; earlier patterns win ties.
    pub const ALL: [ValuePattern; 8] = [
        ValuePattern::Email,
        ValuePattern::Url,
        ValuePattern::Abn,
        ValuePattern::Date,
        ValuePattern::Currency,
        ValuePattern::Phone,
        ValuePattern::Postcode,
        ValuePattern::Flag,
    ];

    pub fn matches(&self, value: &str) -> bool {
        let v = value.trim();
        match self {
            ValuePattern::Email => is_valid_email(v),
            ValuePattern::Url => URL.is_match(v),
            ValuePattern::Abn => {
                let digits: String = v.chars().filter(|c| c.is_ascii_digit()).collect();
                digits.len() == v.chars().filter(|c| !c.is_whitespace()).count() && abn_checksum_valid(&digits)
            }
            ValuePattern::Date => v.len() >= 6 && parse_date(v).is_some(),
            ValuePattern::Currency => CURRENCY.is_match(v),
            ValuePattern::Phone => {
                let digits = v.chars().filter(|c| c.is_ascii_digit()).count();
                PHONE.is_match(v) && (8..=12).contains(&digits)
            }
            ValuePattern::Postcode => POSTCODE.is_match(v),
            ValuePattern::Flag => matches!(
                v.to_ascii_uppercase().as_str(),
                "Y" | "N" | "YES" | "NO" | "T" | "F" | "TRUE" | "FALSE" | "0" | "1"
            ),
        }
    }
}

impl std::fmt::Display for ValuePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValuePattern::Email => "email",
            ValuePattern::Url => "url",
            ValuePattern::Abn => "abn",
            ValuePattern::Date => "date",
            ValuePattern::Currency => "currency",
            ValuePattern::Phone => "phone",
            ValuePattern::Postcode => "postcode",
            ValuePattern::Flag => "flag",
        };
        write!(f, "{}", name)
    }
}

/// The pattern most samples follow, if at least [`PATTERN_MAJORITY`] of them do.
pub fn detect_pattern(samples: &[String]) -> Option<ValuePattern> {
    let values: Vec<&str> = samples.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    if values.is_empty() {
        return None;
    }

    let mut best: Option<(ValuePattern, usize)> = None;
    for pattern in ValuePattern::ALL {
        let hits = values.iter().filter(|v| pattern.matches(v)).count();
        if best.map_or(true, |(_, most)| hits > most) {
            best = Some((pattern, hits));
        }
    }

    best.filter(|(_, hits)| *hits as f64 / values.len() as f64 >= PATTERN_MAJORITY)
        .map(|(pattern, _)| pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detect_common_patterns() {
        assert_eq!(
            detect_pattern(&samples(&["a@b.com", "jane@example.com.au", "x@y.org"])),
            Some(ValuePattern::Email)
        );
        assert_eq!(
            detect_pattern(&samples(&["51824753556", "53004085616"])),
            Some(ValuePattern::Abn)
        );
        assert_eq!(
            detect_pattern(&samples(&["2000", "3121", "0800", "6000"])),
            Some(ValuePattern::Postcode)
        );
        assert_eq!(
            detect_pattern(&samples(&["02 9876 5432", "0412 345 678", "(03) 9555 1234"])),
            Some(ValuePattern::Phone)
        );
        assert_eq!(
            detect_pattern(&samples(&["2023-07-01T00:00:00", "14-MAR-85", "01/02/2020"])),
            Some(ValuePattern::Date)
        );
        assert_eq!(detect_pattern(&samples(&["Y", "N", "N", "Y"])), Some(ValuePattern::Flag));
        assert_eq!(
            detect_pattern(&samples(&["1,200.50", "$35.00", "99.95"])),
            Some(ValuePattern::Currency)
        );
        assert_eq!(
            detect_pattern(&samples(&["https://acme.com.au", "www.example.com"])),
            Some(ValuePattern::Url)
        );
    }

    #[test]
    fn test_no_majority() {
        assert_eq!(detect_pattern(&samples(&["a@b.com", "Acme", "Smith", "Jones"])), None);
        assert_eq!(detect_pattern(&samples(&["", "  "])), None);
        assert_eq!(detect_pattern(&[]), None);
    }
}
