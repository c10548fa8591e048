//! Service return (CO_WSR) → Return__c

use super::clean::to_sf_date;
use super::{keyed_record, put, reference, TransformContext};
use crate::record::{self, Record};

pub const SOURCE_KEY: &str = "WSR_ID";

pub const KEY_FIELDS: &[&str] = &["Name", "Account__c", "Period_Start__c", "Period_End__c", "Return_Status__c"];

pub const EXTRACT_SQL: &str = "SELECT r.WSR_ID, r.EMPLOYER_ID, e.CUSTOMER_ID, r.PERIOD_START_DATE, \
r.PERIOD_END_DATE, r.TOTAL_HOURS, r.TOTAL_WAGES, r.WORKER_COUNT, r.RECEIVED_DATE, r.WSR_STATUS_CODE
FROM CO_WSR r
JOIN CO_EMPLOYER e ON e.EMPLOYER_ID = r.EMPLOYER_ID
ORDER BY r.WSR_ID";

pub fn transform(row: &Record, ctx: &TransformContext, warnings: &mut Vec<String>) -> Result<Record, String> {
    let mut rec = keyed_record(row, SOURCE_KEY)?;
    let wsr_id = record::text(row, SOURCE_KEY).unwrap_or_default();
    rec.insert("Name".to_string(), format!("WSR-{}", wsr_id).into());

    let customer_id = record::text(row, "CUSTOMER_ID").ok_or_else(|| "return has no employer customer".to_string())?;
    rec.insert("Account__r".to_string(), reference(&customer_id));

    let start = record::date(row, "PERIOD_START_DATE");
    let end = record::date(row, "PERIOD_END_DATE");
    if let (Some(s), Some(e)) = (start, end) {
        if e < s {
            return Err(format!("period ends ({}) before it starts ({})", e, s));
        }
    }
    put(&mut rec, "Period_Start__c", start.map(to_sf_date));
    put(&mut rec, "Period_End__c", end.map(to_sf_date));

    put(&mut rec, "Total_Hours__c", record::decimal(row, "TOTAL_HOURS").map(round2));
    let wages = record::decimal(row, "TOTAL_WAGES");
    if wages.is_some_and(|w| w < 0.0) {
        warnings.push(format!("Total_Wages__c: return {} reports negative wages", wsr_id));
    }
    put(&mut rec, "Total_Wages__c", wages.map(round2));
    put(&mut rec, "Worker_Count__c", record::integer(row, "WORKER_COUNT"));
    put(&mut rec, "Received_Date__c", record::date(row, "RECEIVED_DATE").map(to_sf_date));

    put(
        &mut rec,
        "Return_Status__c",
        ctx.picklist("Return_Status__c", "WSR_STATUS", record::text(row, "WSR_STATUS_CODE"), warnings),
    );

    Ok(rec)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::CodeTable;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_transform_return() {
        let codes = CodeTable::from_records(&[row(json!({"CODE_TYPE": "WSR_STATUS", "CODE": "REC", "DESCRIPTION": "Received"}))]);
        let ctx = TransformContext::new(codes);
        let mut warnings = Vec::new();
        let rec = transform(
            &row(json!({
                "WSR_ID": 70001,
                "EMPLOYER_ID": 55,
                "CUSTOMER_ID": 1001,
                "PERIOD_START_DATE": "2023-07-01T00:00:00",
                "PERIOD_END_DATE": "2023-09-30T00:00:00",
                "TOTAL_HOURS": "1520.5",
                "TOTAL_WAGES": 48210.456,
                "WORKER_COUNT": 12,
                "RECEIVED_DATE": "16/10/2023",
                "WSR_STATUS_CODE": "REC"
            })),
            &ctx,
            &mut warnings,
        )
        .unwrap();

        assert_eq!(rec["External_Id__c"], json!("70001"));
        assert_eq!(rec["Name"], json!("WSR-70001"));
        assert_eq!(rec["Account__r"], json!({"External_Id__c": "1001"}));
        assert_eq!(rec["Period_Start__c"], json!("2023-07-01"));
        assert_eq!(rec["Period_End__c"], json!("2023-09-30"));
        assert_eq!(rec["Total_Hours__c"], json!(1520.5));
        assert_eq!(rec["Total_Wages__c"], json!(48210.46));
        assert_eq!(rec["Worker_Count__c"], json!(12));
        assert_eq!(rec["Received_Date__c"], json!("2023-10-16"));
        assert_eq!(rec["Return_Status__c"], json!("Received"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_period_end_before_start_rejects_row() {
        let ctx = TransformContext::new(CodeTable::default());
        let mut warnings = Vec::new();
        let err = transform(
            &row(json!({
                "WSR_ID": 2,
                "CUSTOMER_ID": 1,
                "PERIOD_START_DATE": "2023-07-01",
                "PERIOD_END_DATE": "2023-06-30"
            })),
            &ctx,
            &mut warnings,
        )
        .unwrap_err();
        assert!(err.contains("before"));
    }

    #[test]
    fn test_missing_employer_and_negative_wages() {
        let ctx = TransformContext::new(CodeTable::default());
        let mut warnings = Vec::new();

        let err = transform(&row(json!({"WSR_ID": 3})), &ctx, &mut warnings).unwrap_err();
        assert!(err.contains("employer"));

        let rec = transform(&row(json!({"WSR_ID": 4, "CUSTOMER_ID": 1, "TOTAL_WAGES": -10})), &ctx, &mut warnings).unwrap();
        assert_eq!(rec["Total_Wages__c"], json!(-10.0));
        assert_eq!(warnings.len(), 1);
    }
}
