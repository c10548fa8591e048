use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use co_migration::config::Settings;
use co_migration::load::{self, LoadOptions, Loader};
use co_migration::mapping::FieldMapper;
use co_migration::metadata::{self, SObjectSchema};
use co_migration::report::ArtifactWriter;
use co_migration::salesforce::{ConcurrencyMode, SalesforceClient, UpsertTarget};
use co_migration::sit;
use co_migration::source::{AbrSource, OracleSource, SourceDatabase};
use co_migration::transform::lookup::CODE_TABLE_SQL;
use co_migration::transform::{CodeTable, MigrationObject};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "co-migration")]
#[command(about = "Oracle CO schema to Salesforce migration toolkit")]
struct Cli {
    /// Env profile: loads `.env.<profile>` instead of `.env`
    #[arg(long, global = true)]
    env: Option<String>,

    /// Root for test_output/, mappings/ and error/
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the fields of a Salesforce object
    Describe {
        object: String,
        /// Snapshot the describe to mappings/<Object>_describe.json
        #[arg(long)]
        save: bool,
    },
    /// Print the columns of an Oracle table with sample values
    Columns {
        table: String,
        #[arg(long, default_value_t = 5)]
        samples: usize,
        /// Snapshot the columns to mappings/<TABLE>_columns.json
        #[arg(long)]
        save: bool,
    },
    /// Dump the CO_CODE lookups
    Codes {
        #[arg(long)]
        code_type: Option<String>,
    },
    /// Suggest Oracle column to Salesforce field mappings
    MapFields {
        #[arg(long)]
        table: String,
        #[arg(long)]
        object: String,
        #[arg(long, default_value_t = co_migration::mapping::DEFAULT_THRESHOLD)]
        threshold: f64,
        /// Use the snapshots in mappings/ instead of live connections
        #[arg(long)]
        offline: bool,
    },
    /// Extract, transform, validate and upsert one object
    Load {
        #[arg(value_enum)]
        object: MigrationObject,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = co_migration::salesforce::bulk::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
        /// Parallel Bulk API concurrency instead of serial
        #[arg(long)]
        parallel: bool,
        /// Write the records that would be loaded without calling Salesforce
        #[arg(long)]
        dry_run: bool,
        /// Skip ABR enrichment of accounts
        #[arg(long)]
        no_abr: bool,
        /// Keep the raw extract under test_output/extracts/
        #[arg(long)]
        save_extract: bool,
    },
    /// Pre-load validation report only
    Validate {
        #[arg(value_enum)]
        object: MigrationObject,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Compare source keys and values against what Salesforce holds
    Reconcile {
        #[arg(value_enum)]
        object: MigrationObject,
        #[arg(long, default_value_t = 500)]
        sample: usize,
    },
    /// SIT smoke checks against the loaded sandbox
    Sit {
        #[arg(value_enum)]
        object: MigrationObject,
        #[arg(long, default_value_t = 1)]
        expected: u64,
        #[arg(long, default_value_t = sit::DEFAULT_SAMPLE_SIZE)]
        sample: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.env.as_deref()).context("loading settings")?;
    if let Some(dir) = &cli.output_dir {
        settings = settings.with_output_dir(dir);
    }
    settings.output.ensure()?;
    let writer = ArtifactWriter::new(settings.output.clone());

    match cli.command {
        Command::Describe { object, save } => {
            let client = SalesforceClient::login(settings.salesforce()?).await?;
            let schema = client.describe(&object).await?;
            print_schema(&schema);
            if save {
                let path = writer.mapping_path(&format!("{}_describe", schema.name), "json");
                schema.save(&path)?;
                println!("\n📄 Saved {}", path.display());
            }
        }
        Command::Columns { table, samples, save } => {
            let oracle = OracleSource::connect(settings.oracle()?).await?;
            let columns = oracle.table_columns(&table, samples).await?;
            let rows = oracle.count(&table).await?;
            println!("{}", "=".repeat(70));
            println!("📋 {} ({} rows, {} columns)", table.to_uppercase(), rows, columns.len());
            println!("{}", "=".repeat(70));
            for c in &columns {
                println!(
                    "   {:<32} {:<12} {:>6} {}  {}",
                    c.name,
                    c.data_type,
                    c.length.map(|l| l.to_string()).unwrap_or_default(),
                    if c.nullable { " " } else { "*" },
                    c.samples.join(" | ")
                );
            }
            if save {
                let path = writer.mapping_path(&format!("{}_columns", table.to_uppercase()), "json");
                metadata::save_columns(&columns, &path)?;
                println!("\n📄 Saved {}", path.display());
            }
        }
        Command::Codes { code_type } => {
            let oracle = OracleSource::connect(settings.oracle()?).await?;
            let codes = CodeTable::from_records(&oracle.query(CODE_TABLE_SQL).await?);
            let types: Vec<String> = match code_type {
                Some(t) => vec![t.to_uppercase()],
                None => codes.code_types().into_iter().map(str::to_string).collect(),
            };
            for t in types {
                println!("\n📚 {}", t);
                for (code, description) in codes.codes_of(&t) {
                    println!("   {:<12} {}", code, description);
                }
            }
        }
        Command::MapFields {
            table,
            object,
            threshold,
            offline,
        } => {
            let table = table.to_uppercase();
            let (columns, schema) = if offline {
                let columns = metadata::load_columns(&writer.mapping_path(&format!("{}_columns", table), "json"))
                    .context("run `columns --save` first")?;
                let stem = format!("{}_describe", object);
                let path = metadata::find_snapshot(&writer.dirs().mappings(), &stem)
                    .with_context(|| format!("no {}.json in mappings/, run `describe --save` first", stem))?;
                let schema = SObjectSchema::load(&path)?;
                (columns, schema)
            } else {
                let oracle = OracleSource::connect(settings.oracle()?).await?;
                let client = SalesforceClient::login(settings.salesforce()?).await?;
                (oracle.table_columns(&table, 20).await?, client.describe(&object).await?)
            };

            let report = FieldMapper::new(threshold).map_table(&columns, &schema);
            println!("{}", report);
            let stem = report.file_stem();
            writer.write_rows(writer.mapping_path(&stem, "csv"), &report.rows())?;
            writer.write_json(writer.mapping_path(&stem, "json"), &report)?;
        }
        Command::Load {
            object,
            limit,
            batch_size,
            parallel,
            dry_run,
            no_abr,
            save_extract,
        } => {
            let oracle = OracleSource::connect(settings.oracle()?).await?;
            let abr = if no_abr || object != MigrationObject::Account {
                None
            } else {
                match settings.abr() {
                    Ok(abr_settings) => Some(AbrSource::connect(abr_settings).await?),
                    Err(e) => {
                        warn!("ABR enrichment skipped: {}", e);
                        None
                    }
                }
            };
            let options = LoadOptions {
                limit,
                dry_run,
                enrich_abr: abr.is_some(),
                save_extract,
            };

            let client = if dry_run {
                None
            } else {
                Some(SalesforceClient::login(settings.salesforce()?).await?)
            };

            let mut loader = Loader::new(&oracle, writer.clone(), options);
            if let Some(abr) = &abr {
                loader = loader.with_abr(abr);
            }
            if let Some(client) = &client {
                loader = loader.with_org(client, object).await?;
            }

            let bulk = client.as_ref().map(|c| {
                c.bulk().with_batch_size(batch_size).with_concurrency(if parallel {
                    ConcurrencyMode::Parallel
                } else {
                    ConcurrencyMode::Serial
                })
            });
            let summary = loader
                .run(object, bulk.as_ref().map(|b| b as &dyn UpsertTarget))
                .await?;
            println!("{}", summary);
            if summary.failed > 0 {
                warn!("{} records failed, see {:?}", summary.failed, summary.error_file);
            }
        }
        Command::Validate { object, limit } => {
            let oracle = OracleSource::connect(settings.oracle()?).await?;
            let schema = match settings.salesforce() {
                Ok(sf) => Some(SalesforceClient::login(sf).await?.describe(object.sobject()).await?),
                Err(_) => {
                    info!("Salesforce not configured, validating with baseline rules only");
                    None
                }
            };
            let options = LoadOptions {
                limit,
                ..LoadOptions::default()
            };
            let mut loader = Loader::new(&oracle, writer.clone(), options);
            if let Some(schema) = schema {
                loader = loader.with_schema(schema);
            }
            let batch = loader.prepare(object).await?;
            println!("{}", batch.validation);
            let path = loader.write_preload(object, &batch.validation)?;
            println!("📄 {}", path.display());
            if !batch.output.rejected.is_empty() {
                println!("⚠️  {} rows rejected by the transform", batch.output.rejected.len());
            }
        }
        Command::Reconcile { object, sample } => {
            let oracle = OracleSource::connect(settings.oracle()?).await?;
            let client = SalesforceClient::login(settings.salesforce()?).await?;
            let loader = Loader::new(&oracle, writer.clone(), LoadOptions::default());
            let result = load::reconcile(loader, &client, object, sample).await?;
            println!("{}", result);
            let path = writer.test_output_path(&format!("{}_reconcile", object.sobject()), "csv");
            writer.write_rows(path, &result.rows())?;
            if !result.is_clean() {
                bail!("{} reconciliation found differences", object);
            }
        }
        Command::Sit {
            object,
            expected,
            sample,
        } => {
            let client = SalesforceClient::login(settings.salesforce()?).await?;
            let report = sit::run(&client, object, expected, sample).await?;
            println!("{}", report);
            writer.write_json(writer.test_output_path(&format!("{}_sit", object.sobject()), "json"), &report)?;
            if !report.passed() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn print_schema(schema: &SObjectSchema) {
    println!("{}", "=".repeat(70));
    println!("📡 {} ({}) - {} fields", schema.name, schema.label, schema.fields.len());
    println!("{}", "=".repeat(70));
    for f in &schema.fields {
        let mut flags = Vec::new();
        if f.is_required() {
            flags.push("required");
        }
        if f.external_id {
            flags.push("external id");
        }
        if !f.createable {
            flags.push("read only");
        }
        println!(
            "   {:<36} {:<14} {:>6}  {}",
            f.name,
            f.field_type,
            if f.length > 0 { f.length.to_string() } else { String::new() },
            flags.join(", ")
        );
        if !f.picklist_values.is_empty() {
            println!("      ↳ {}", f.picklist_values.join(" | "));
        }
    }
}
