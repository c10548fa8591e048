//! Field officer visit (CO_FIELD_OFFICER_VISIT) → ServiceReport__c

use super::clean::{clean_text, to_sf_date};
use super::{keyed_record, put, reference, TransformContext};
use crate::record::{self, Record};

pub const SOURCE_KEY: &str = "VISIT_ID";

pub const KEY_FIELDS: &[&str] = &["Account__c", "Visit_Date__c", "Visit_Type__c", "Outcome__c"];

pub const EXTRACT_SQL: &str = "SELECT v.VISIT_ID, v.EMPLOYER_ID, e.CUSTOMER_ID, v.VISIT_DATE, \
v.VISIT_TYPE_CODE, v.OUTCOME_CODE, v.OFFICER_EMAIL, v.NOTES
FROM CO_FIELD_OFFICER_VISIT v
JOIN CO_EMPLOYER e ON e.EMPLOYER_ID = v.EMPLOYER_ID
ORDER BY v.VISIT_ID";

const NOTES_MAX_LEN: usize = 32_000;

pub fn transform(row: &Record, ctx: &TransformContext, warnings: &mut Vec<String>) -> Result<Record, String> {
    let mut rec = keyed_record(row, SOURCE_KEY)?;

    let customer_id = record::text(row, "CUSTOMER_ID").ok_or_else(|| "visit has no employer customer".to_string())?;
    rec.insert("Account__r".to_string(), reference(&customer_id));

    put(&mut rec, "Visit_Date__c", record::date(row, "VISIT_DATE").map(to_sf_date));
    put(
        &mut rec,
        "Visit_Type__c",
        ctx.picklist("Visit_Type__c", "VISIT_TYPE", record::text(row, "VISIT_TYPE_CODE"), warnings),
    );
    put(
        &mut rec,
        "Outcome__c",
        ctx.picklist("Outcome__c", "VISIT_OUTCOME", record::text(row, "OUTCOME_CODE"), warnings),
    );

    let notes = record::text(row, "NOTES");
    if notes.as_ref().is_some_and(|n| n.chars().count() > NOTES_MAX_LEN) {
        warnings.push(format!(
            "Notes__c: visit {} notes truncated to {} characters",
            record::text(row, SOURCE_KEY).unwrap_or_default(),
            NOTES_MAX_LEN
        ));
    }
    put(&mut rec, "Notes__c", notes.and_then(|n| clean_notes(&n)));

    if let Some(email) = record::text(row, "OFFICER_EMAIL") {
        match ctx.users_by_email.get(&email.to_lowercase()) {
            Some(user_id) => {
                rec.insert("OwnerId".to_string(), user_id.clone().into());
            }
            None if !ctx.users_by_email.is_empty() => {
                warnings.push(format!("OwnerId: no active user for officer '{}'", email));
            }
            None => {}
        }
    }

    Ok(rec)
}

/// Notes keep their line breaks; only the ends are trimmed.
fn clean_notes(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains('\n') {
        Some(trimmed.chars().take(NOTES_MAX_LEN).collect())
    } else {
        clean_text(trimmed, NOTES_MAX_LEN)
    }
}
