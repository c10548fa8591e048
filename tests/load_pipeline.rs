use async_trait::async_trait;
use co_migration::config::OutputDirs;
use co_migration::load::{self, LoadOptions, Loader};
use co_migration::metadata::SObjectSchema;
use co_migration::record::{self, Record};
use co_migration::report::ArtifactWriter;
use co_migration::salesforce::{UpsertResult, UpsertTarget};
use co_migration::sit;
use co_migration::source::CsvSource;
use co_migration::MigrationObject;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Upserts into memory; ids listed in `reject` come back as failures.
struct MemoryTarget {
    reject: Vec<String>,
    received: Mutex<Vec<Record>>,
}

impl MemoryTarget {
    fn new(reject: &[&str]) -> Self {
        Self {
            reject: reject.iter().map(|s| s.to_string()).collect(),
            received: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl UpsertTarget for MemoryTarget {
    async fn upsert(
        &self,
        _object: &str,
        external_id_field: &str,
        records: &[Record],
    ) -> co_migration::Result<Vec<UpsertResult>> {
        self.received.lock().unwrap().extend(records.iter().cloned());
        Ok(records
            .iter()
            .map(|r| {
                let id = record::text(r, external_id_field);
                if id.as_ref().is_some_and(|id| self.reject.contains(id)) {
                    UpsertResult::failed(id, "FIELD_CUSTOM_VALIDATION_EXCEPTION: rejected")
                } else {
                    UpsertResult {
                        sf_id: id.as_ref().map(|i| format!("001{:0>12}", i)),
                        external_id: id,
                        success: true,
                        created: true,
                        errors: vec![],
                    }
                }
            })
            .collect())
    }
}

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn seed_employers(dir: &Path) {
    write(
        dir,
        "CO_CODE.csv",
        "CODE_TYPE,CODE,DESCRIPTION\n\
         EMPLOYER_STATUS,ACT,Active\n\
         EMPLOYER_STATUS,CAN,Cancelled\n\
         WSR_STATUS,REC,Received\n",
    );
    write(
        dir,
        "CO_EMPLOYER.csv",
        "CUSTOMER_ID,EMPLOYER_ID,CUSTOMER_NAME,TRADING_NAME,ABN,ACN,PHONE_NUMBER,EMAIL_ADDRESS,STREET_ADDRESS,SUBURB,STATE,POSTCODE,EMPLOYER_STATUS_CODE,REGISTRATION_DATE\n\
         1001,55,Acme Construction Pty Ltd,Acme Builds,51 824 753 556,,(02) 9876 5432,accounts@acme.com.au,1 George St,Sydney,NSW,2000,ACT,2015-03-01\n\
         1002,56,,,,,,,,,,,ACT,\n\
         1003,57,Beta Scaffolding,,,,,,,Darwin,NT,0800,CAN,2010-07-01\n\
         1004,58,Gamma Cranes,,,,,,,,,,ACT,\n\
         1004,59,Gamma Cranes (dup),,,,,,,,,,ACT,\n",
    );
    write(
        dir,
        "ABR_CLEANED.csv",
        "ABN,ABN_STATUS,ABN_STATUS_FROM_DATE,MAIN_INDUSTRY_CODE,ENTITY_TYPE\n\
         51824753556,ACT,2001-11-01,3101,PRV\n",
    );
}

#[tokio::test]
async fn test_account_load_end_to_end() {
    let source_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    seed_employers(source_dir.path());

    let source = CsvSource::new(source_dir.path());
    let abr = CsvSource::new(source_dir.path());
    let options = LoadOptions {
        enrich_abr: true,
        ..LoadOptions::default()
    };
    let loader = Loader::new(&source, ArtifactWriter::new(OutputDirs::new(out_dir.path())), options).with_abr(&abr);
    let target = MemoryTarget::new(&["1003"]);

    let summary = loader.run(MigrationObject::Account, Some(&target)).await.unwrap();

    assert_eq!(summary.extracted, 5);
    assert_eq!(summary.transformed, 4);
    assert_eq!(summary.rejected, 1);
    // both rows sharing CUSTOMER_ID 1004 are held back
    assert_eq!(summary.invalid, 2);
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.failed, 1);
    assert!(!summary.dry_run);

    let received = target.received.lock().unwrap();
    let ids: Vec<String> = received.iter().filter_map(|r| record::text(r, "External_Id__c")).collect();
    assert_eq!(ids, vec!["1001".to_string(), "1003".to_string()]);

    let acme = &received[0];
    assert_eq!(record::text(acme, "ABN__c").as_deref(), Some("51824753556"));
    assert_eq!(record::text(acme, "ABR_Status__c").as_deref(), Some("Active"));
    assert_eq!(record::text(acme, "ANZSIC_Code__c").as_deref(), Some("3101"));
    assert_eq!(record::text(acme, "Employer_Status__c").as_deref(), Some("Active"));
    assert_eq!(record::text(&received[1], "BillingPostalCode").as_deref(), Some("0800"));

    let error_file = summary.error_file.clone().expect("error CSV written");
    assert!(error_file.starts_with(out_dir.path().join("error")));
    let errors = fs::read_to_string(&error_file).unwrap();
    assert!(errors.starts_with("external_id,stage,message"));
    assert!(errors.contains("1002,transform,"));
    assert!(errors.contains("1003,upsert,FIELD_CUSTOM_VALIDATION_EXCEPTION"));
    assert!(errors.contains("1004,validation,"));

    assert!(summary.preload_file.as_ref().is_some_and(|p| p.exists()));
    assert!(summary.to_string().contains("✅ Created:   1"));

    let batch = loader.prepare(MigrationObject::Account).await.unwrap();
    assert_eq!(batch.validation.failing_records, summary.invalid);
}

#[tokio::test]
async fn test_dry_run_writes_records_without_upserting() {
    let source_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    seed_employers(source_dir.path());
    write(
        source_dir.path(),
        "CO_WSR.csv",
        "WSR_ID,CUSTOMER_ID,PERIOD_START_DATE,PERIOD_END_DATE,TOTAL_HOURS,TOTAL_WAGES,WORKER_COUNT,RECEIVED_DATE,WSR_STATUS_CODE\n\
         9001,1001,2023-07-01,2023-09-30,1520.5,48210.456,12,2023-10-14,REC\n\
         9002,1001,2023-10-01,2023-09-30,0,0,0,,REC\n",
    );

    let source = CsvSource::new(source_dir.path());
    let options = LoadOptions {
        dry_run: true,
        save_extract: true,
        ..LoadOptions::default()
    };
    let loader = Loader::new(&source, ArtifactWriter::new(OutputDirs::new(out_dir.path())), options);
    let target = MemoryTarget::new(&[]);

    let summary = loader.run(MigrationObject::Return, Some(&target)).await.unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.transformed, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.attempted, 0);
    assert!(target.received.lock().unwrap().is_empty());

    let records = CsvSource::read_file(summary.records_file.as_ref().unwrap()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(record::text(&records[0], "Name").as_deref(), Some("WSR-9001"));
    assert_eq!(record::text(&records[0], "Return_Status__c").as_deref(), Some("Received"));

    let replay = out_dir.path().join("test_output").join("extracts").join("CO_WSR.csv");
    assert_eq!(CsvSource::read_file(&replay).unwrap().len(), 2);
}

fn seed_workers(dir: &Path) {
    write(
        dir,
        "CO_CODE.csv",
        "CODE_TYPE,CODE,DESCRIPTION\n\
         GENDER,M,MALE\n\
         GENDER,F,FEMALE\n\
         WORKER_STATUS,ACT,Active\n",
    );
    write(
        dir,
        "CO_WORKER.csv",
        "WORKER_ID,GIVEN_NAMES,SURNAME,DATE_OF_BIRTH,GENDER_CODE,EMAIL_ADDRESS,STATE,POSTCODE,WORKER_STATUS_CODE,START_DATE,EMPLOYER_CUSTOMER_ID\n\
         501,Jane,Citizen,1985-03-14,F,jane@example.com,QLD,4000,ACT,2020-01-06,1001\n\
         502,Sam,Lee,1990-07-01,M,,NSW,2000,ACT,,1001\n",
    );
}

fn contact_schema() -> SObjectSchema {
    serde_json::from_value(serde_json::json!({
        "name": "Contact",
        "label": "Contact",
        "fields": [
            {"name": "LastName", "label": "Last Name", "type": "string", "length": 80, "nillable": false},
            {"name": "FirstName", "label": "First Name", "type": "string", "length": 40},
            {"name": "Email", "label": "Email", "type": "email", "length": 80},
            {"name": "Gender__c", "label": "Gender", "type": "picklist",
             "restricted_picklist": true, "picklist_values": ["Male", "Female"]},
            {"name": "Worker_Status__c", "label": "Worker Status", "type": "picklist",
             "restricted_picklist": true, "picklist_values": ["Active", "Inactive"]}
        ]
    }))
    .unwrap()
}

#[tokio::test]
async fn test_reconcile_matches_what_was_loaded() {
    let source_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    seed_workers(source_dir.path());
    let source = CsvSource::new(source_dir.path());
    let writer = ArtifactWriter::new(OutputDirs::new(out_dir.path()));

    let target = MemoryTarget::new(&[]);
    let summary = Loader::new(&source, writer.clone(), LoadOptions::default())
        .with_schema(contact_schema())
        .run(MigrationObject::Contact, Some(&target))
        .await
        .unwrap();
    assert_eq!(summary.created, 2);
    assert_eq!(summary.invalid, 0);

    // what Salesforce now holds
    let loaded = target.received.lock().unwrap().clone();
    assert_eq!(record::text(&loaded[1], "Gender__c").as_deref(), Some("Male"));

    let batch = Loader::new(&source, writer.clone(), LoadOptions::default())
        .with_schema(contact_schema())
        .prepare(MigrationObject::Contact)
        .await
        .unwrap();
    let result = load::compare_batch(&batch, &loaded, 500).unwrap();
    assert!(result.is_clean(), "{:?}", result.rows());
    assert_eq!(result.data_diff.compared_records, 2);
    assert!(result.data_diff.matches > 0);
    assert!(result.rows().is_empty());

    // without the describe the code descriptions pass through unresolved
    let unresolved = Loader::new(&source, writer, LoadOptions::default())
        .prepare(MigrationObject::Contact)
        .await
        .unwrap();
    let drifted = load::compare_batch(&unresolved, &loaded, 500).unwrap();
    assert!(!drifted.is_clean());
    assert!(drifted
        .data_diff
        .mismatches
        .iter()
        .all(|m| m.field == "Gender__c"));
    assert_eq!(drifted.data_diff.mismatches.len(), 2);
}

#[tokio::test]
async fn test_reconcile_flags_records_missing_from_salesforce() {
    let source_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    seed_workers(source_dir.path());
    let source = CsvSource::new(source_dir.path());
    let loader = Loader::new(&source, ArtifactWriter::new(OutputDirs::new(out_dir.path())), LoadOptions::default())
        .with_schema(contact_schema());

    let target = MemoryTarget::new(&[]);
    loader.run(MigrationObject::Contact, Some(&target)).await.unwrap();
    let mut loaded = target.received.lock().unwrap().clone();
    loaded.retain(|r| record::text(r, "External_Id__c").as_deref() != Some("502"));

    let batch = loader.prepare(MigrationObject::Contact).await.unwrap();
    let result = load::compare_batch(&batch, &loaded, 500).unwrap();
    assert!(!result.is_clean());
    assert_eq!(result.population_diff.missing_in_sf, vec!["502".to_string()]);
    assert_eq!(result.data_diff.missing_records, 1);
    assert_eq!(result.rows()[0].category, "missing_in_sf");
}

#[tokio::test]
async fn test_sit_checks_pass_on_loaded_contacts() {
    let source_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    seed_workers(source_dir.path());
    let source = CsvSource::new(source_dir.path());

    let target = MemoryTarget::new(&[]);
    Loader::new(&source, ArtifactWriter::new(OutputDirs::new(out_dir.path())), LoadOptions::default())
        .with_schema(contact_schema())
        .run(MigrationObject::Contact, Some(&target))
        .await
        .unwrap();
    let loaded = target.received.lock().unwrap().clone();

    let report = sit::evaluate(MigrationObject::Contact, loaded.len() as u64, 2, &loaded);
    assert!(report.passed(), "{}", report);
    assert_eq!(report.checks.len(), 1 + MigrationObject::Contact.key_fields().len());

    let short = sit::evaluate(MigrationObject::Contact, loaded.len() as u64, 3, &loaded);
    assert_eq!(short.failures(), 1);
}
