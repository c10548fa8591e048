//! Field-level cleaners shared by the object transforms

use chrono::{NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref EMAIL: Regex = Regex::new(r"^[a-z0-9._%+'-]+@[a-z0-9-]+(\.[a-z0-9-]+)*\.[a-z]{2,}$").unwrap();
}

const ABN_WEIGHTS: [u32; 11] = [10, 1, 3, 5, 7, 9, 11, 13, 15, 17, 19];

/// Trim, collapse internal whitespace and truncate to `max_len` characters.
pub fn clean_text(raw: &str, max_len: usize) -> Option<String> {
    let collapsed = WHITESPACE.replace_all(raw.trim(), " ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(max_len).collect())
}

/// Australian phone numbers: digits only, `+61` for international form,
/// mobiles missing their leading zero restored.
pub fn clean_phone(raw: &str) -> Option<String> {
    let international = raw.trim_start().starts_with('+');
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 6 {
        return None;
    }

    if international || (digits.starts_with("61") && digits.len() == 11) {
        return Some(format!("+{}", digits));
    }
    if digits.len() == 9 && digits.starts_with('4') {
        return Some(format!("0{}", digits));
    }
    Some(digits)
}

pub fn clean_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if is_valid_email(&email) {
        Some(email)
    } else {
        None
    }
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL.is_match(&value.to_lowercase())
}

/// 11 digits with a valid ABN check digit, spaces removed.
pub fn clean_abn(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if abn_checksum_valid(&digits) {
        Some(digits)
    } else {
        None
    }
}

pub fn abn_checksum_valid(digits: &str) -> bool {
    if digits.len() != 11 || !digits.chars().all(|c| c.is_ascii_digit()) || digits.starts_with('0') {
        return false;
    }
    let sum: u32 = digits
        .chars()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(idx, d)| {
            let d = if idx == 0 { d - 1 } else { d };
            d * ABN_WEIGHTS[idx]
        })
        .sum();
    sum % 89 == 0
}

pub fn clean_acn(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 9 {
        Some(digits)
    } else {
        None
    }
}

/// Four digit postcode; three digit NT postcodes that lost their zero are padded.
pub fn clean_postcode(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        4 => Some(digits),
        3 => Some(format!("0{}", digits)),
        _ => None,
    }
}

pub fn state_code(raw: &str) -> Option<String> {
    let upper = raw.trim().to_ascii_uppercase().replace('.', "");
    let code = match upper.as_str() {
        "NSW" | "NEW SOUTH WALES" => "NSW",
        "VIC" | "VICTORIA" => "VIC",
        "QLD" | "QUEENSLAND" => "QLD",
        "SA" | "SOUTH AUSTRALIA" => "SA",
        "WA" | "WESTERN AUSTRALIA" => "WA",
        "TAS" | "TASMANIA" => "TAS",
        "NT" | "NORTHERN TERRITORY" => "NT",
        "ACT" | "AUSTRALIAN CAPITAL TERRITORY" => "ACT",
        _ => return None,
    };
    Some(code.to_string())
}

pub fn to_sf_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn to_sf_datetime(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Acme   Pty\tLtd ", 255).as_deref(), Some("Acme Pty Ltd"));
        assert_eq!(clean_text("   ", 255), None);
        assert_eq!(clean_text("abcdef", 3).as_deref(), Some("abc"));
    }

    #[test]
    fn test_clean_phone() {
        assert_eq!(clean_phone("(02) 9876 5432").as_deref(), Some("0298765432"));
        assert_eq!(clean_phone("61 412 345 678").as_deref(), Some("+61412345678"));
        assert_eq!(clean_phone("+61 412 345 678").as_deref(), Some("+61412345678"));
        assert_eq!(clean_phone("412345678").as_deref(), Some("0412345678"));
        assert_eq!(clean_phone("123"), None);
    }

    #[test]
    fn test_clean_email() {
        assert_eq!(clean_email(" Jane.Citizen@Example.COM.au ").as_deref(), Some("jane.citizen@example.com.au"));
        assert_eq!(clean_email("N/A"), None);
        assert_eq!(clean_email("jane@localhost"), None);
    }

    #[test]
    fn test_abn_checksum() {
        assert_eq!(clean_abn("51 824 753 556").as_deref(), Some("51824753556"));
        assert_eq!(clean_abn("51 824 753 557"), None);
        assert_eq!(clean_abn("1234"), None);
        assert!(!abn_checksum_valid("01824753556"));
    }

    #[test]
    fn test_postcode_and_state() {
        assert_eq!(clean_postcode("800").as_deref(), Some("0800"));
        assert_eq!(clean_postcode("2000").as_deref(), Some("2000"));
        assert_eq!(clean_postcode("20"), None);
        assert_eq!(state_code("New South Wales").as_deref(), Some("NSW"));
        assert_eq!(state_code("vic").as_deref(), Some("VIC"));
        assert_eq!(state_code("Auckland"), None);
    }
}
