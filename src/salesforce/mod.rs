//! Salesforce REST and Bulk API access

pub mod bulk;
pub mod client;
pub mod types;

pub use bulk::{BulkClient, ConcurrencyMode};
pub use client::SalesforceClient;
pub use types::{UpsertResult, UpsertTarget};

/// Upsert key carrying the Oracle primary key on every migrated object.
pub const EXTERNAL_ID_FIELD: &str = "External_Id__c";
