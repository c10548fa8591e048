//! Employer (CO_EMPLOYER + CO_CUSTOMER) → Account

use super::clean::{clean_abn, clean_acn, clean_email, clean_phone, clean_postcode, clean_text, state_code, to_sf_date};
use super::{keyed_record, put, TransformContext};
use crate::record::{self, Record};
use crate::source::AbrEntry;

pub const SOURCE_KEY: &str = "CUSTOMER_ID";

pub const KEY_FIELDS: &[&str] = &["Name", "ABN__c", "BillingPostalCode", "Employer_Status__c"];

pub const EXTRACT_SQL: &str = "SELECT c.CUSTOMER_ID, e.EMPLOYER_ID, c.CUSTOMER_NAME, c.TRADING_NAME, \
c.ABN, c.ACN, c.PHONE_NUMBER, c.EMAIL_ADDRESS, c.STREET_ADDRESS, c.SUBURB, c.STATE, c.POSTCODE, \
e.EMPLOYER_STATUS_CODE, e.REGISTRATION_DATE
FROM CO_EMPLOYER e
JOIN CO_CUSTOMER c ON c.CUSTOMER_ID = e.CUSTOMER_ID
ORDER BY c.CUSTOMER_ID";

pub fn transform(row: &Record, ctx: &TransformContext, warnings: &mut Vec<String>) -> Result<Record, String> {
    let mut rec = keyed_record(row, SOURCE_KEY)?;

    let legal_name = record::text(row, "CUSTOMER_NAME");
    let trading_name = record::text(row, "TRADING_NAME");
    let name = legal_name
        .as_deref()
        .or(trading_name.as_deref())
        .and_then(|n| clean_text(n, ctx.field_length("Name", 255)))
        .ok_or_else(|| "employer has neither a customer nor a trading name".to_string())?;
    rec.insert("Name".to_string(), name.into());

    put(
        &mut rec,
        "Trading_Name__c",
        trading_name.and_then(|n| clean_text(&n, ctx.field_length("Trading_Name__c", 255))),
    );
    put(&mut rec, "Employer_Id__c", record::text(row, "EMPLOYER_ID"));

    let abn = record::text(row, "ABN");
    let clean = abn.as_deref().and_then(clean_abn);
    if let (Some(raw), None) = (&abn, &clean) {
        warnings.push(format!("ABN__c: '{}' fails the ABN check digit", raw));
    }
    put(&mut rec, "ABN__c", clean.clone());
    put(&mut rec, "ACN__c", record::text(row, "ACN").as_deref().and_then(clean_acn));

    put(&mut rec, "Phone", record::text(row, "PHONE_NUMBER").as_deref().and_then(clean_phone));
    put(&mut rec, "Email__c", record::text(row, "EMAIL_ADDRESS").as_deref().and_then(clean_email));

    put(
        &mut rec,
        "BillingStreet",
        record::text(row, "STREET_ADDRESS").and_then(|s| clean_text(&s, 255)),
    );
    put(&mut rec, "BillingCity", record::text(row, "SUBURB").and_then(|s| clean_text(&s, 40)));
    put(&mut rec, "BillingState", record::text(row, "STATE").as_deref().and_then(state_code));
    put(&mut rec, "BillingPostalCode", record::text(row, "POSTCODE").as_deref().and_then(clean_postcode));
    rec.insert("BillingCountry".to_string(), "Australia".into());

    put(
        &mut rec,
        "Employer_Status__c",
        ctx.picklist(
            "Employer_Status__c",
            "EMPLOYER_STATUS",
            record::text(row, "EMPLOYER_STATUS_CODE"),
            warnings,
        ),
    );
    put(&mut rec, "Registration_Date__c", record::date(row, "REGISTRATION_DATE").map(to_sf_date));

    if let Some(entry) = clean.as_ref().and_then(|abn| ctx.abr.get(abn)) {
        enrich(&mut rec, entry);
    }

    Ok(rec)
}

/// Copy ABR registration details onto an Account.
pub fn enrich(rec: &mut Record, entry: &AbrEntry) {
    put(rec, "ABR_Status__c", entry.status.as_deref().map(abr_status_label));
    put(rec, "ABR_Status_Date__c", entry.status_from.map(to_sf_date));
    put(rec, "ANZSIC_Code__c", entry.industry_code.clone());
}

fn abr_status_label(status: &str) -> String {
    match status.trim().to_ascii_uppercase().as_str() {
        "ACT" | "ACTIVE" => "Active".to_string(),
        "CAN" | "CANCELLED" => "Cancelled".to_string(),
        other => other.to_string(),
    }
}
