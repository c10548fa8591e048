//! Worker (CO_WORKER + CO_PERSON + latest CO_EMPLOYMENT_PERIOD) → Contact

use super::clean::{clean_email, clean_phone, clean_postcode, clean_text, state_code, to_sf_date};
use super::{keyed_record, put, reference, TransformContext};
use crate::record::{self, Record};

pub const SOURCE_KEY: &str = "WORKER_ID";

pub const KEY_FIELDS: &[&str] = &["LastName", "FirstName", "Birthdate", "AccountId"];

pub const EXTRACT_SQL: &str = "SELECT w.WORKER_ID, p.PERSON_ID, p.GIVEN_NAMES, p.SURNAME, p.DATE_OF_BIRTH, \
p.GENDER_CODE, p.EMAIL_ADDRESS, p.MOBILE_NUMBER, p.PHONE_NUMBER, p.STREET_ADDRESS, p.SUBURB, p.STATE, \
p.POSTCODE, w.WORKER_STATUS_CODE, ep.START_DATE, ep.END_DATE, e.CUSTOMER_ID AS EMPLOYER_CUSTOMER_ID
FROM CO_WORKER w
JOIN CO_PERSON p ON p.PERSON_ID = w.PERSON_ID
LEFT JOIN (
    SELECT WORKER_ID, EMPLOYER_ID, START_DATE, END_DATE,
           ROW_NUMBER() OVER (PARTITION BY WORKER_ID ORDER BY START_DATE DESC NULLS LAST) AS RN
    FROM CO_EMPLOYMENT_PERIOD
) ep ON ep.WORKER_ID = w.WORKER_ID AND ep.RN = 1
LEFT JOIN CO_EMPLOYER e ON e.EMPLOYER_ID = ep.EMPLOYER_ID
ORDER BY w.WORKER_ID";

const UNKNOWN_SURNAME: &str = "Unknown";

pub fn transform(row: &Record, ctx: &TransformContext, warnings: &mut Vec<String>) -> Result<Record, String> {
    let mut rec = keyed_record(row, SOURCE_KEY)?;

    put(
        &mut rec,
        "FirstName",
        record::text(row, "GIVEN_NAMES").and_then(|n| clean_text(&n, ctx.field_length("FirstName", 40))),
    );
    let last_name = record::text(row, "SURNAME")
        .and_then(|n| clean_text(&n, ctx.field_length("LastName", 80)))
        .unwrap_or_else(|| {
            warnings.push(format!(
                "LastName: worker {} has no surname, using '{}'",
                record::text(row, SOURCE_KEY).unwrap_or_default(),
                UNKNOWN_SURNAME
            ));
            UNKNOWN_SURNAME.to_string()
        });
    rec.insert("LastName".to_string(), last_name.into());

    let birthdate = record::date(row, "DATE_OF_BIRTH");
    let start = record::date(row, "START_DATE");
    let end = record::date(row, "END_DATE");
    if let (Some(s), Some(e)) = (start, end) {
        if e < s {
            return Err(format!("employment ends ({}) before it starts ({})", e, s));
        }
    }
    put(&mut rec, "Birthdate", birthdate.map(to_sf_date));

    put(&mut rec, "Email", record::text(row, "EMAIL_ADDRESS").as_deref().and_then(clean_email));
    put(&mut rec, "MobilePhone", record::text(row, "MOBILE_NUMBER").as_deref().and_then(clean_phone));
    put(&mut rec, "Phone", record::text(row, "PHONE_NUMBER").as_deref().and_then(clean_phone));

    put(
        &mut rec,
        "MailingStreet",
        record::text(row, "STREET_ADDRESS").and_then(|s| clean_text(&s, 255)),
    );
    put(&mut rec, "MailingCity", record::text(row, "SUBURB").and_then(|s| clean_text(&s, 40)));
    put(&mut rec, "MailingState", record::text(row, "STATE").as_deref().and_then(state_code));
    put(&mut rec, "MailingPostalCode", record::text(row, "POSTCODE").as_deref().and_then(clean_postcode));

    put(
        &mut rec,
        "Gender__c",
        ctx.picklist("Gender__c", "GENDER", record::text(row, "GENDER_CODE"), warnings),
    );
    put(
        &mut rec,
        "Worker_Status__c",
        ctx.picklist(
            "Worker_Status__c",
            "WORKER_STATUS",
            record::text(row, "WORKER_STATUS_CODE"),
            warnings,
        ),
    );
    put(&mut rec, "Employment_Start_Date__c", start.map(to_sf_date));
    put(&mut rec, "Employment_End_Date__c", end.map(to_sf_date));

    if let Some(customer_id) = record::text(row, "EMPLOYER_CUSTOMER_ID") {
        rec.insert("Account".to_string(), reference(&customer_id));
    }

    Ok(rec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::CodeTable;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn codes() -> CodeTable {
        let rows: Vec<Record> = vec![
            row(json!({"CODE_TYPE": "GENDER", "CODE": "F", "DESCRIPTION": "Female"})),
            row(json!({"CODE_TYPE": "WORKER_STATUS", "CODE": "ACT", "DESCRIPTION": "Active"})),
        ];
        CodeTable::from_records(&rows)
    }

    #[test]
    fn test_transform_worker() {
        let ctx = TransformContext::new(codes());
        let mut warnings = Vec::new();
        let rec = transform(
            &row(json!({
                "WORKER_ID": 501,
                "GIVEN_NAMES": "Jane  Maree",
                "SURNAME": "Citizen",
                "DATE_OF_BIRTH": "14-MAR-85",
                "GENDER_CODE": "F",
                "EMAIL_ADDRESS": "JANE@EXAMPLE.COM",
                "MOBILE_NUMBER": "412 345 678",
                "STATE": "qld",
                "POSTCODE": "4000",
                "WORKER_STATUS_CODE": "ACT",
                "START_DATE": "2020-01-06T00:00:00",
                "EMPLOYER_CUSTOMER_ID": 1001
            })),
            &ctx,
            &mut warnings,
        )
        .unwrap();

        assert_eq!(rec["External_Id__c"], json!("501"));
        assert_eq!(rec["FirstName"], json!("Jane Maree"));
        assert_eq!(rec["LastName"], json!("Citizen"));
        assert_eq!(rec["Birthdate"], json!("1985-03-14"));
        assert_eq!(rec["Gender__c"], json!("Female"));
        assert_eq!(rec["Worker_Status__c"], json!("Active"));
        assert_eq!(rec["Email"], json!("jane@example.com"));
        assert_eq!(rec["MobilePhone"], json!("0412345678"));
        assert_eq!(rec["MailingState"], json!("QLD"));
        assert_eq!(rec["Employment_Start_Date__c"], json!("2020-01-06"));
        assert_eq!(rec["Account"], json!({"External_Id__c": "1001"}));
        assert!(rec.get("Employment_End_Date__c").is_none());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_latest_employment_period_ignores_open_start() {
        // Oracle sorts NULLs first on DESC
        assert!(EXTRACT_SQL.contains("ORDER BY START_DATE DESC NULLS LAST) AS RN"));
    }

    #[test]
    fn test_missing_surname_defaults() {
        let ctx = TransformContext::new(CodeTable::default());
        let mut warnings = Vec::new();
        let rec = transform(&row(json!({"WORKER_ID": 9, "GIVEN_NAMES": "Sam"})), &ctx, &mut warnings).unwrap();
        assert_eq!(rec["LastName"], json!("Unknown"));
        assert_eq!(warnings.len(), 1);
        assert!(rec.get("Account").is_none());
    }

    #[test]
    fn test_employment_end_before_start_rejects_row() {
        let ctx = TransformContext::new(CodeTable::default());
        let mut warnings = Vec::new();
        let err = transform(
            &row(json!({"WORKER_ID": 3, "SURNAME": "Lee", "START_DATE": "2021-05-01", "END_DATE": "2020-05-01"})),
            &ctx,
            &mut warnings,
        )
        .unwrap_err();
        assert!(err.contains("before"));
    }
}
