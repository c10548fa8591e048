//! Oracle row → Salesforce record transforms

pub mod account;
pub mod clean;
pub mod contact;
pub mod lookup;
pub mod service_report;
pub mod wsr;

pub use lookup::{CodeTable, PicklistMatch, PicklistResolver};

use crate::metadata::SObjectSchema;
use crate::record::{self, Record};
use crate::salesforce::EXTERNAL_ID_FIELD;
use crate::source::AbrEntry;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info};

/// Objects the toolkit migrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
pub enum MigrationObject {
    Account,
    Contact,
    Return,
    ServiceReport,
}

impl MigrationObject {
    pub fn sobject(&self) -> &'static str {
        match self {
            MigrationObject::Account => "Account",
            MigrationObject::Contact => "Contact",
            MigrationObject::Return => "Return__c",
            MigrationObject::ServiceReport => "ServiceReport__c",
        }
    }

    /// Oracle primary key carried into `External_Id__c`.
    pub fn source_key(&self) -> &'static str {
        match self {
            MigrationObject::Account => account::SOURCE_KEY,
            MigrationObject::Contact => contact::SOURCE_KEY,
            MigrationObject::Return => wsr::SOURCE_KEY,
            MigrationObject::ServiceReport => service_report::SOURCE_KEY,
        }
    }

    pub fn driving_table(&self) -> &'static str {
        match self {
            MigrationObject::Account => "CO_EMPLOYER",
            MigrationObject::Contact => "CO_WORKER",
            MigrationObject::Return => "CO_WSR",
            MigrationObject::ServiceReport => "CO_FIELD_OFFICER_VISIT",
        }
    }

    pub fn extract_sql(&self, limit: Option<usize>) -> String {
        let base = match self {
            MigrationObject::Account => account::EXTRACT_SQL,
            MigrationObject::Contact => contact::EXTRACT_SQL,
            MigrationObject::Return => wsr::EXTRACT_SQL,
            MigrationObject::ServiceReport => service_report::EXTRACT_SQL,
        };
        match limit {
            Some(n) => format!("{}\nFETCH FIRST {} ROWS ONLY", base, n),
            None => base.to_string(),
        }
    }

    /// Fields the SIT checks expect to be populated on most records.
    pub fn key_fields(&self) -> &'static [&'static str] {
        match self {
            MigrationObject::Account => account::KEY_FIELDS,
            MigrationObject::Contact => contact::KEY_FIELDS,
            MigrationObject::Return => wsr::KEY_FIELDS,
            MigrationObject::ServiceReport => service_report::KEY_FIELDS,
        }
    }

    pub fn transform(
        &self,
        row: &Record,
        ctx: &TransformContext,
        warnings: &mut Vec<String>,
    ) -> Result<Record, String> {
        match self {
            MigrationObject::Account => account::transform(row, ctx, warnings),
            MigrationObject::Contact => contact::transform(row, ctx, warnings),
            MigrationObject::Return => wsr::transform(row, ctx, warnings),
            MigrationObject::ServiceReport => service_report::transform(row, ctx, warnings),
        }
    }
}

impl std::fmt::Display for MigrationObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sobject())
    }
}

/// Lookups shared by every row of one transform run.
#[derive(Default)]
pub struct TransformContext {
    pub codes: CodeTable,
    pub schema: Option<SObjectSchema>,
    pub abr: HashMap<String, AbrEntry>,
    /// Active Salesforce users, lower-case e-mail → User Id.
    pub users_by_email: HashMap<String, String>,
    resolver: PicklistResolver,
}

impl TransformContext {
    pub fn new(codes: CodeTable) -> Self {
        Self {
            codes,
            ..Default::default()
        }
    }

    pub fn with_schema(mut self, schema: SObjectSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_abr(mut self, abr: HashMap<String, AbrEntry>) -> Self {
        self.abr = abr;
        self
    }

    pub fn with_users(mut self, users: &[Record]) -> Self {
        self.users_by_email = users
            .iter()
            .filter_map(|u| Some((record::text(u, "Email")?.to_lowercase(), record::text(u, "Id")?)))
            .collect();
        self
    }

    /// Field length from the describe, or `default` when unknown.
    pub fn field_length(&self, field: &str, default: usize) -> usize {
        self.schema
            .as_ref()
            .and_then(|s| s.field(field))
            .map(|f| f.length as usize)
            .filter(|len| *len > 0)
            .unwrap_or(default)
    }

    /// Translate a CO code into the picklist value Salesforce accepts.
    ///
    /// Without a describe the code description is passed through.
    pub fn picklist(
        &self,
        field: &str,
        code_type: &str,
        code: Option<String>,
        warnings: &mut Vec<String>,
    ) -> Option<String> {
        let code = code?;
        let description = self
            .codes
            .describe(code_type, &code)
            .map(str::to_string)
            .unwrap_or_else(|| code.clone());

        let allowed = match self.schema.as_ref().and_then(|s| s.field(field)) {
            Some(f) if !f.picklist_values.is_empty() => &f.picklist_values,
            _ => return Some(description),
        };

        match self.resolver.resolve(&description, allowed) {
            PicklistMatch::Unresolved => {
                warnings.push(format!(
                    "{}: '{}' ({}/{}) is not a picklist value",
                    field, description, code_type, code
                ));
                None
            }
            PicklistMatch::Fuzzy(value, score) => {
                debug!("{}: '{}' matched '{}' ({:.2})", field, description, value, score);
                Some(value)
            }
            matched => matched.value().map(str::to_string),
        }
    }
}

/// A source row that could not be transformed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub source_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct TransformOutput {
    pub records: Vec<Record>,
    pub rejected: Vec<RowError>,
    pub warnings: Vec<String>,
}

pub fn transform_all(object: MigrationObject, rows: &[Record], ctx: &TransformContext) -> TransformOutput {
    let mut output = TransformOutput::default();
    for row in rows {
        match object.transform(row, ctx, &mut output.warnings) {
            Ok(rec) => output.records.push(rec),
            Err(message) => output.rejected.push(RowError {
                source_id: record::text(row, object.source_key()),
                message,
            }),
        }
    }
    info!(
        "{}: {} transformed, {} rejected, {} warnings",
        object,
        output.records.len(),
        output.rejected.len(),
        output.warnings.len()
    );
    output
}

/// Insert only populated values; absent keys leave Salesforce values untouched.
pub(crate) fn put<V: Into<Value>>(rec: &mut Record, field: &str, value: Option<V>) {
    if let Some(v) = value {
        rec.insert(field.to_string(), v.into());
    }
}

/// Relationship reference resolved through the parent's external id.
pub(crate) fn reference(external_id: &str) -> Value {
    json!({ EXTERNAL_ID_FIELD: external_id })
}

/// Start a record carrying the upsert key, or fail the row.
pub(crate) fn keyed_record(row: &Record, source_key: &str) -> Result<Record, String> {
    let id = record::text(row, source_key).ok_or_else(|| format!("{} is empty", source_key))?;
    let mut rec = Record::new();
    rec.insert(EXTERNAL_ID_FIELD.to_string(), Value::String(id));
    Ok(rec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::SfField;

    fn schema_with_gender() -> SObjectSchema {
        SObjectSchema {
            name: "Contact".to_string(),
            label: "Contact".to_string(),
            fields: vec![SfField {
                name: "Gender__c".to_string(),
                label: "Gender".to_string(),
                field_type: "picklist".to_string(),
                length: 255,
                nillable: true,
                createable: true,
                updateable: true,
                external_id: false,
                defaulted_on_create: false,
                restricted_picklist: true,
                picklist_values: vec!["Male".to_string(), "Female".to_string()],
                reference_to: vec![],
            }],
        }
    }

    fn codes() -> CodeTable {
        let rows: Vec<Record> = vec![
            json!({"CODE_TYPE": "GENDER", "CODE": "M", "DESCRIPTION": "MALE"}),
            json!({"CODE_TYPE": "GENDER", "CODE": "U", "DESCRIPTION": "Unknown"}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();
        CodeTable::from_records(&rows)
    }

    #[test]
    fn test_picklist_without_schema_passes_description() {
        let ctx = TransformContext::new(codes());
        let mut warnings = Vec::new();
        let value = ctx.picklist("Gender__c", "GENDER", Some("M".to_string()), &mut warnings);
        assert_eq!(value.as_deref(), Some("MALE"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_picklist_with_schema_resolves_or_warns() {
        let ctx = TransformContext::new(codes()).with_schema(schema_with_gender());
        let mut warnings = Vec::new();

        let male = ctx.picklist("Gender__c", "GENDER", Some("M".to_string()), &mut warnings);
        assert_eq!(male.as_deref(), Some("Male"));

        let unknown = ctx.picklist("Gender__c", "GENDER", Some("U".to_string()), &mut warnings);
        assert_eq!(unknown, None);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Unknown"));
    }

    #[test]
    fn test_field_length_falls_back() {
        let ctx = TransformContext::new(CodeTable::default()).with_schema(schema_with_gender());
        assert_eq!(ctx.field_length("Gender__c", 10), 255);
        assert_eq!(ctx.field_length("Name", 80), 80);
    }

    #[test]
    fn test_extract_sql_limit() {
        let sql = MigrationObject::Return.extract_sql(Some(5));
        assert!(sql.ends_with("FETCH FIRST 5 ROWS ONLY"));
        assert_eq!(crate::source::driving_table(&sql).as_deref(), Some("CO_WSR"));
    }

    #[test]
    fn test_with_users_indexes_by_lowercase_email() {
        let users: Vec<Record> = vec![json!({"Id": "005A", "Email": "Officer@Example.com"})
            .as_object()
            .cloned()
            .unwrap()];
        let ctx = TransformContext::new(CodeTable::default()).with_users(&users);
        assert_eq!(ctx.users_by_email.get("officer@example.com").map(String::as_str), Some("005A"));
    }
}
