use crate::error::Result;
use crate::metadata::{SObjectSchema, SfField};
use crate::record::Record;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One page of a SOQL query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub total_size: u64,
    pub done: bool,
    #[serde(default)]
    pub next_records_url: Option<String>,
    #[serde(default)]
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DescribeResponse {
    pub name: String,
    pub label: String,
    pub fields: Vec<DescribeField>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub length: u32,
    #[serde(default)]
    pub nillable: bool,
    #[serde(default)]
    pub createable: bool,
    #[serde(default)]
    pub updateable: bool,
    #[serde(default)]
    pub external_id: bool,
    #[serde(default)]
    pub defaulted_on_create: bool,
    #[serde(default)]
    pub restricted_picklist: bool,
    #[serde(default)]
    pub picklist_values: Vec<PicklistEntry>,
    #[serde(default)]
    pub reference_to: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PicklistEntry {
    pub active: bool,
    pub value: String,
}

impl From<DescribeField> for SfField {
    fn from(f: DescribeField) -> Self {
        SfField {
            name: f.name,
            label: f.label,
            field_type: f.field_type,
            length: f.length,
            nillable: f.nillable,
            createable: f.createable,
            updateable: f.updateable,
            external_id: f.external_id,
            defaulted_on_create: f.defaulted_on_create,
            restricted_picklist: f.restricted_picklist,
            picklist_values: f
                .picklist_values
                .into_iter()
                .filter(|p| p.active)
                .map(|p| p.value)
                .collect(),
            reference_to: f.reference_to,
        }
    }
}

impl From<DescribeResponse> for SObjectSchema {
    fn from(d: DescribeResponse) -> Self {
        SObjectSchema {
            name: d.name,
            label: d.label,
            fields: d.fields.into_iter().map(SfField::from).collect(),
        }
    }
}

/// Outcome of upserting one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpsertResult {
    pub external_id: Option<String>,
    pub sf_id: Option<String>,
    pub success: bool,
    pub created: bool,
    pub errors: Vec<String>,
}

impl UpsertResult {
    pub fn failed(external_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            external_id,
            sf_id: None,
            success: false,
            created: false,
            errors: vec![message.into()],
        }
    }
}

/// Anything that can upsert records by external id; the Bulk API in production.
#[async_trait]
pub trait UpsertTarget: Send + Sync {
    /// Results come back in input order.
    async fn upsert(
        &self,
        object: &str,
        external_id_field: &str,
        records: &[Record],
    ) -> Result<Vec<UpsertResult>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_into_schema_keeps_active_picklist_values() {
        let body = r#"{
            "name": "Contact",
            "label": "Contact",
            "fields": [
                {"name": "Gender__c", "label": "Gender", "type": "picklist", "length": 255,
                 "nillable": true, "createable": true, "updateable": true, "externalId": false,
                 "restrictedPicklist": true,
                 "picklistValues": [
                    {"active": true, "value": "Male", "label": "Male"},
                    {"active": false, "value": "Unknown", "label": "Unknown"}
                 ],
                 "referenceTo": []},
                {"name": "External_Id__c", "label": "External Id", "type": "string", "length": 50,
                 "nillable": true, "createable": true, "updateable": true, "externalId": true}
            ]
        }"#;
        let describe: DescribeResponse = serde_json::from_str(body).unwrap();
        let schema = SObjectSchema::from(describe);

        let gender = schema.field("gender__c").unwrap();
        assert_eq!(gender.picklist_values, vec!["Male".to_string()]);
        assert!(gender.restricted_picklist);
        assert!(schema.field("External_Id__c").unwrap().external_id);
    }

    #[test]
    fn test_query_response_paging_fields() {
        let body = r#"{"totalSize": 3, "done": false, "nextRecordsUrl": "/services/data/v59.0/query/01g-2000",
                       "records": [{"attributes": {"type": "Account"}, "Id": "001"}]}"#;
        let page: QueryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(page.total_size, 3);
        assert!(!page.done);
        assert_eq!(page.records.len(), 1);
    }
}
