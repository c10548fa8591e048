//! Extract → transform → validate → upsert for one object

use crate::diff::{external_ids, ComparisonResult, DiffEngine};
use crate::error::Result;
use crate::metadata::SObjectSchema;
use crate::record::{self, Record};
use crate::report::{record_headers, ArtifactWriter};
use crate::salesforce::{SalesforceClient, UpsertResult, UpsertTarget, EXTERNAL_ID_FIELD};
use crate::source::{abr::lookup_abns, SourceDatabase};
use crate::transform::lookup::CODE_TABLE_SQL;
use crate::transform::{transform_all, CodeTable, MigrationObject, TransformContext, TransformOutput};
use crate::validation::{ValidationReport, Validator};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

pub const ACTIVE_USERS_SOQL: &str = "SELECT Id, Email FROM User WHERE IsActive = true";

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub limit: Option<usize>,
    pub dry_run: bool,
    /// Look up ABNs in the ABR source when one is attached.
    pub enrich_abr: bool,
    /// Write the raw extract under `test_output/extracts/` for replay.
    pub save_extract: bool,
}

/// A record that did not make it into Salesforce.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpsertFailure {
    pub external_id: String,
    pub stage: String,
    pub message: String,
}

/// Transformed and validated batch, ready to upsert.
pub struct PreparedBatch {
    pub extracted: usize,
    pub output: TransformOutput,
    pub validation: ValidationReport,
}

impl PreparedBatch {
    /// Records that passed every pre-load rule.
    pub fn loadable(&self) -> Vec<Record> {
        let failing = self.validation.failing_ids();
        self.output
            .records
            .iter()
            .filter(|r| {
                r.get(EXTERNAL_ID_FIELD)
                    .and_then(record::value_text)
                    .map_or(false, |id| !failing.contains(id.as_str()))
            })
            .cloned()
            .collect()
    }

    pub fn failures(&self) -> Vec<UpsertFailure> {
        let mut failures: Vec<UpsertFailure> = self
            .output
            .rejected
            .iter()
            .map(|r| UpsertFailure {
                external_id: r.source_id.clone().unwrap_or_default(),
                stage: "transform".to_string(),
                message: r.message.clone(),
            })
            .collect();
        failures.extend(self.validation.rows().into_iter().map(|v| UpsertFailure {
            message: format!("{} violation on {}", v.rule, v.field),
            external_id: v.external_id,
            stage: "validation".to_string(),
        }));
        failures
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub run_id: String,
    pub object: String,
    pub dry_run: bool,
    pub extracted: usize,
    pub transformed: usize,
    pub rejected: usize,
    pub invalid: usize,
    pub attempted: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub warnings: usize,
    pub error_file: Option<PathBuf>,
    pub preload_file: Option<PathBuf>,
    pub records_file: Option<PathBuf>,
}

impl LoadSummary {
    pub fn succeeded(&self) -> usize {
        self.created + self.updated
    }
}

impl std::fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", "=".repeat(70))?;
        writeln!(
            f,
            "📊 {} load summary{}",
            self.object,
            if self.dry_run { " (dry run)" } else { "" }
        )?;
        writeln!(f, "{}", "=".repeat(70))?;
        writeln!(f, "   Run:          {}", self.run_id)?;
        writeln!(f, "   Extracted:    {}", self.extracted)?;
        writeln!(f, "   Transformed:  {}", self.transformed)?;
        writeln!(f, "   Rejected:     {}", self.rejected)?;
        writeln!(f, "   Invalid:      {}", self.invalid)?;
        writeln!(f, "   Warnings:     {}", self.warnings)?;
        if !self.dry_run {
            writeln!(f, "   Attempted:    {}", self.attempted)?;
            writeln!(f, "   ✅ Created:   {}", self.created)?;
            writeln!(f, "   ✅ Updated:   {}", self.updated)?;
            writeln!(f, "   ❌ Failed:    {}", self.failed)?;
        }
        for (label, path) in [
            ("Records", &self.records_file),
            ("Pre-load", &self.preload_file),
            ("Errors", &self.error_file),
        ] {
            if let Some(p) = path {
                writeln!(f, "   📄 {}: {}", label, p.display())?;
            }
        }
        Ok(())
    }
}

pub struct Loader<'a> {
    source: &'a dyn SourceDatabase,
    writer: ArtifactWriter,
    options: LoadOptions,
    abr: Option<&'a dyn SourceDatabase>,
    schema: Option<SObjectSchema>,
    users: Vec<Record>,
}

impl<'a> Loader<'a> {
    pub fn new(source: &'a dyn SourceDatabase, writer: ArtifactWriter, options: LoadOptions) -> Self {
        Self {
            source,
            writer,
            options,
            abr: None,
            schema: None,
            users: Vec::new(),
        }
    }

    pub fn with_abr(mut self, abr: &'a dyn SourceDatabase) -> Self {
        self.abr = Some(abr);
        self
    }

    pub fn with_schema(mut self, schema: SObjectSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Active users (`Id`, `Email`) for owner assignment.
    pub fn with_users(mut self, users: Vec<Record>) -> Self {
        self.users = users;
        self
    }

    /// Attach what the transforms read from the target org: the object's
    /// describe and, for service reports, the active users.
    pub async fn with_org(self, client: &SalesforceClient, object: MigrationObject) -> Result<Self> {
        let mut loader = self.with_schema(client.describe(object.sobject()).await?);
        if object == MigrationObject::ServiceReport {
            loader = loader.with_users(client.query_all(ACTIVE_USERS_SOQL).await?);
        }
        Ok(loader)
    }

    pub fn writer(&self) -> &ArtifactWriter {
        &self.writer
    }

    pub async fn extract(&self, object: MigrationObject) -> Result<Vec<Record>> {
        let sql = object.extract_sql(self.options.limit);
        let rows = self.source.query(&sql).await?;
        info!("Extracted {} {} rows from {}", rows.len(), object.driving_table(), self.source.name());
        if self.options.save_extract {
            self.writer
                .write_records(self.writer.extract_path(object.driving_table()), &rows)?;
        }
        Ok(rows)
    }

    pub async fn load_codes(&self) -> Result<CodeTable> {
        let rows = self.source.query(CODE_TABLE_SQL).await?;
        if self.options.save_extract {
            self.writer.write_records(self.writer.extract_path("CO_CODE"), &rows)?;
        }
        let codes = CodeTable::from_records(&rows);
        info!("Loaded {} codes across {} code types", codes.len(), codes.code_types().len());
        Ok(codes)
    }

    async fn context(&self, object: MigrationObject, rows: &[Record]) -> Result<TransformContext> {
        let mut ctx = TransformContext::new(self.load_codes().await?).with_users(&self.users);
        if let Some(schema) = &self.schema {
            ctx = ctx.with_schema(schema.clone());
        }

        if object == MigrationObject::Account && self.options.enrich_abr {
            match self.abr {
                Some(abr) => {
                    let abns: Vec<String> = rows.iter().filter_map(|r| record::text(r, "ABN")).collect();
                    ctx = ctx.with_abr(lookup_abns(abr, &abns).await?);
                }
                None => warn!("ABR enrichment requested but no ABR source is configured"),
            }
        }
        Ok(ctx)
    }

    /// Extract, transform and validate without touching Salesforce.
    pub async fn prepare(&self, object: MigrationObject) -> Result<PreparedBatch> {
        let rows = self.extract(object).await?;
        let ctx = self.context(object, &rows).await?;
        let output = transform_all(object, &rows, &ctx);
        for w in output.warnings.iter().take(20) {
            warn!("{}", w);
        }

        let validator = Validator::for_object(object, self.schema.as_ref());
        let validation = validator.validate(object.sobject(), &output.records)?;

        Ok(PreparedBatch {
            extracted: rows.len(),
            output,
            validation,
        })
    }

    /// Write the pre-load validation CSV.
    pub fn write_preload(&self, object: MigrationObject, report: &ValidationReport) -> Result<PathBuf> {
        let path = self
            .writer
            .test_output_path(&format!("{}_preload", object.sobject()), "csv");
        self.writer.write_rows(path, &report.rows())
    }

    pub async fn run(&self, object: MigrationObject, target: Option<&dyn UpsertTarget>) -> Result<LoadSummary> {
        let run_id = Uuid::new_v4().to_string();
        info!("Starting {} load (run {})", object, run_id);

        let batch = self.prepare(object).await?;
        let preload_file = Some(self.write_preload(object, &batch.validation)?);
        let loadable = batch.loadable();
        let mut failures = batch.failures();

        let mut summary = LoadSummary {
            run_id,
            object: object.sobject().to_string(),
            dry_run: self.options.dry_run || target.is_none(),
            extracted: batch.extracted,
            transformed: batch.output.records.len(),
            rejected: batch.output.rejected.len(),
            invalid: batch.output.records.len() - loadable.len(),
            attempted: 0,
            created: 0,
            updated: 0,
            failed: 0,
            warnings: batch.output.warnings.len(),
            error_file: None,
            preload_file,
            records_file: None,
        };

        match target {
            Some(target) if !self.options.dry_run => {
                summary.attempted = loadable.len();
                let results = if loadable.is_empty() {
                    Vec::new()
                } else {
                    target.upsert(object.sobject(), EXTERNAL_ID_FIELD, &loadable).await?
                };
                tally(&mut summary, &results);
                failures.extend(results.iter().filter(|r| !r.success).map(|r| UpsertFailure {
                    external_id: r.external_id.clone().unwrap_or_default(),
                    stage: "upsert".to_string(),
                    message: r.errors.join("; "),
                }));
            }
            _ => {
                let path = self
                    .writer
                    .test_output_path(&format!("{}_dryrun", object.sobject()), "csv");
                summary.records_file = Some(self.writer.write_records(path, &loadable)?);
            }
        }

        if !failures.is_empty() {
            summary.error_file = Some(
                self.writer
                    .write_rows(self.writer.error_path(object.sobject()), &failures)?,
            );
        }

        info!(
            "{} load finished: {} succeeded, {} failed, {} rejected, {} invalid",
            object,
            summary.succeeded(),
            summary.failed,
            summary.rejected,
            summary.invalid
        );
        Ok(summary)
    }
}

/// Scalar fields of the transformed records worth comparing against Salesforce.
pub fn comparable_fields(records: &[Record]) -> Vec<String> {
    record_headers(records)
        .into_iter()
        .filter(|h| h != EXTERNAL_ID_FIELD && h != "OwnerId")
        .filter(|h| !records.iter().any(|r| matches!(r.get(h.as_str()), Some(Value::Object(_)))))
        .collect()
}

pub fn reconcile_soql(object: MigrationObject, fields: &[String]) -> String {
    let mut select = vec![EXTERNAL_ID_FIELD.to_string()];
    select.extend(fields.iter().cloned());
    format!(
        "SELECT {} FROM {} WHERE {} != null",
        select.join(", "),
        object.sobject(),
        EXTERNAL_ID_FIELD
    )
}

/// Post-load diff: every source key against every `External_Id__c` in
/// Salesforce, plus a field diff over the first `sample` source records.
///
/// The loader is given the org's describe first, so picklist values and
/// truncation come out exactly as they did on load.
pub async fn reconcile(
    loader: Loader<'_>,
    client: &SalesforceClient,
    object: MigrationObject,
    sample: usize,
) -> Result<ComparisonResult> {
    let loader = loader.with_org(client, object).await?;
    let batch = loader.prepare(object).await?;
    let fields = comparable_fields(&batch.output.records);
    let actual = client.query_all(&reconcile_soql(object, &fields)).await?;
    info!("Fetched {} {} records for reconciliation", actual.len(), object);
    compare_batch(&batch, &actual, sample)
}

/// Diff a prepared batch against the records Salesforce returned.
pub fn compare_batch(batch: &PreparedBatch, actual: &[Record], sample: usize) -> Result<ComparisonResult> {
    let fields = comparable_fields(&batch.output.records);
    let engine = DiffEngine;
    let population_diff = engine.population_diff(&external_ids(&batch.output.records), &external_ids(actual))?;
    let expected_sample: Vec<Record> = batch.output.records.iter().take(sample).cloned().collect();
    let data_diff = engine.data_diff(&expected_sample, actual, &fields);

    Ok(ComparisonResult {
        population_diff,
        data_diff,
    })
}

fn tally(summary: &mut LoadSummary, results: &[UpsertResult]) {
    let mut seen: HashSet<&str> = HashSet::new();
    for r in results {
        if let Some(id) = r.external_id.as_deref() {
            if !seen.insert(id) {
                warn!("External id {} reported more than once", id);
            }
        }
        match (r.success, r.created) {
            (true, true) => summary.created += 1,
            (true, false) => summary.updated += 1,
            (false, _) => summary.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally() {
        let mut summary = LoadSummary {
            run_id: "r".to_string(),
            object: "Account".to_string(),
            dry_run: false,
            extracted: 3,
            transformed: 3,
            rejected: 0,
            invalid: 0,
            attempted: 3,
            created: 0,
            updated: 0,
            failed: 0,
            warnings: 0,
            error_file: None,
            preload_file: None,
            records_file: None,
        };
        let ok = |id: &str, created: bool| UpsertResult {
            external_id: Some(id.to_string()),
            sf_id: Some(format!("001{}", id)),
            success: true,
            created,
            errors: vec![],
        };
        tally(
            &mut summary,
            &[ok("1", true), ok("2", false), UpsertResult::failed(Some("3".to_string()), "DUPLICATE_VALUE")],
        );
        assert_eq!((summary.created, summary.updated, summary.failed), (1, 1, 1));
        assert_eq!(summary.succeeded(), 2);
        assert!(summary.to_string().contains("❌ Failed:    1"));
    }

    #[test]
    fn test_comparable_fields_skip_references() {
        let records: Vec<Record> = vec![
            serde_json::json!({"External_Id__c": "1", "LastName": "Lee", "Account": {"External_Id__c": "9"}}),
            serde_json::json!({"External_Id__c": "2", "LastName": "Ng", "OwnerId": "005A", "Birthdate": "1990-01-02"}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();
        assert_eq!(comparable_fields(&records), vec!["LastName".to_string(), "Birthdate".to_string()]);
    }

    #[test]
    fn test_reconcile_soql() {
        let fields = vec!["LastName".to_string(), "Gender__c".to_string()];
        assert_eq!(
            reconcile_soql(MigrationObject::Contact, &fields),
            "SELECT External_Id__c, LastName, Gender__c FROM Contact WHERE External_Id__c != null"
        );
    }
}
