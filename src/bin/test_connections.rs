//! Check connectivity to every configured system
//!
//! Run with: cargo run --bin test_connections -- [--env sit]

use clap::Parser;
use co_migration::config::Settings;
use co_migration::salesforce::SalesforceClient;
use co_migration::source::{AbrSource, OracleSource, SourceDatabase};

#[derive(Parser)]
struct Args {
    /// Env profile: loads `.env.<profile>` instead of `.env`
    #[arg(long)]
    env: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.env.as_deref())?;

    println!("🔌 Testing connections ({})...\n", co_migration::config::env_file_name(args.env.as_deref()));
    let mut failures = 0;

    match &settings.oracle {
        Some(oracle) => {
            println!("📡 Oracle: {}", oracle.connect_string());
            match OracleSource::connect(oracle).await {
                Ok(source) => match source.query("SELECT COUNT(*) AS N FROM CO_EMPLOYER").await {
                    Ok(rows) => {
                        let n = rows.first().and_then(|r| co_migration::record::integer(r, "N")).unwrap_or(0);
                        println!("   ✅ Connected, CO_EMPLOYER has {} rows", n);
                    }
                    Err(e) => println!("   ⚠️  Connected but CO_EMPLOYER not readable: {}", e),
                },
                Err(e) => {
                    failures += 1;
                    println!("   ❌ Connection failed: {}", e);
                    println!("   💡 Check ORACLE_HOST, ORACLE_PORT and ORACLE_SID, and that the Oracle client libraries are installed");
                }
            }
        }
        None => println!("⏭️  Oracle: not configured (ORACLE_USER/ORACLE_PASSWORD/ORACLE_HOST/ORACLE_SID)"),
    }

    match &settings.salesforce {
        Some(sf) => {
            println!("\n📡 Salesforce: {} as {}", sf.login_url(), sf.username);
            match SalesforceClient::login(sf).await {
                Ok(client) => match client.count("Account", None).await {
                    Ok(n) => println!("   ✅ Logged in to {}, {} accounts visible", client.instance_url(), n),
                    Err(e) => println!("   ⚠️  Logged in but query failed: {}", e),
                },
                Err(e) => {
                    failures += 1;
                    println!("   ❌ Login failed: {}", e);
                    println!("   💡 Check SF_PASSWORD and SF_SECURITY_TOKEN, and SF_DOMAIN (login or test)");
                }
            }
        }
        None => println!("\n⏭️  Salesforce: not configured (SF_USERNAME/SF_PASSWORD/SF_SECURITY_TOKEN)"),
    }

    match &settings.abr {
        Some(abr) => {
            println!("\n📡 ABR SQL Server: {}:{}/{}", abr.host, abr.port, abr.database);
            match AbrSource::connect(abr).await {
                Ok(source) => match source.query("SELECT COUNT(*) AS N FROM abr_cleaned").await {
                    Ok(rows) => {
                        let n = rows.first().and_then(|r| co_migration::record::integer(r, "N")).unwrap_or(0);
                        println!("   ✅ Connected, abr_cleaned has {} rows", n);
                    }
                    Err(e) => println!("   ⚠️  Connected but abr_cleaned not readable: {}", e),
                },
                Err(e) => {
                    failures += 1;
                    println!("   ❌ Connection failed: {}", e);
                    println!("   💡 Check ABR_HOST, ABR_PORT and ABR_TRUST_CERT");
                }
            }
        }
        None => println!("\n⏭️  ABR: not configured (ABR_HOST/ABR_DATABASE/ABR_USER/ABR_PASSWORD)"),
    }

    println!("\n{}", "=".repeat(70));
    if failures == 0 {
        println!("✅ All configured connections OK");
        Ok(())
    } else {
        println!("❌ {} connection(s) failed", failures);
        std::process::exit(1);
    }
}
