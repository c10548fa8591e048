//! ABR enrichment source (SQL Server `abr_cleaned`)

use super::{in_list, SourceDatabase};
use crate::config::AbrSettings;
use crate::error::{MigrationError, Result};
use crate::record::{self, Record};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tiberius::{AuthMethod, Client, ColumnData, Config, FromSqlOwned};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

/// ABNs per `IN (...)` lookup.
pub const ABN_CHUNK_SIZE: usize = 1000;

/// Registration details for one ABN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbrEntry {
    pub abn: String,
    pub status: Option<String>,
    pub status_from: Option<NaiveDate>,
    pub industry_code: Option<String>,
    pub entity_type: Option<String>,
}

impl AbrEntry {
    pub fn from_record(rec: &Record) -> Option<Self> {
        Some(Self {
            abn: record::text(rec, "ABN")?,
            status: record::text(rec, "ABN_STATUS"),
            status_from: record::date(rec, "ABN_STATUS_FROM_DATE"),
            industry_code: record::text(rec, "MAIN_INDUSTRY_CODE"),
            entity_type: record::text(rec, "ENTITY_TYPE"),
        })
    }
}

pub struct AbrSource {
    client: Mutex<Client<Compat<TcpStream>>>,
}

impl AbrSource {
    pub async fn connect(settings: &AbrSettings) -> Result<Self> {
        let mut config = Config::new();
        config.host(&settings.host);
        config.port(settings.port);
        config.database(&settings.database);
        config.authentication(AuthMethod::sql_server(&settings.user, &settings.password));
        if settings.trust_cert {
            config.trust_cert();
        }

        info!("Connecting to ABR SQL Server {}:{}", settings.host, settings.port);
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| MigrationError::SqlServer(format!("TCP connect failed: {}", e)))?;
        tcp.set_nodelay(true)?;

        let client = Client::connect(config, tcp.compat_write()).await?;
        Ok(Self {
            client: Mutex::new(client),
        })
    }
}

#[async_trait]
impl SourceDatabase for AbrSource {
    fn name(&self) -> &str {
        "abr"
    }

    async fn query(&self, sql: &str) -> Result<Vec<Record>> {
        debug!("abr: {}", sql);
        let mut client = self.client.lock().await;
        let stream = client.query(sql, &[]).await?;
        let rows = stream.into_first_result().await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let names: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
            let mut rec = Record::new();
            for (name, data) in names.into_iter().zip(row.into_iter()) {
                rec.insert(name, column_value(data)?);
            }
            out.push(rec);
        }
        Ok(out)
    }
}

/// Look up ABR details for a set of ABNs, keyed by ABN.
///
/// Works against any source holding an `abr_cleaned` table.
pub async fn lookup_abns(
    source: &dyn SourceDatabase,
    abns: &[String],
) -> Result<HashMap<String, AbrEntry>> {
    let mut wanted: Vec<String> = abns
        .iter()
        .map(|a| a.chars().filter(|c| c.is_ascii_digit()).collect::<String>())
        .filter(|a| a.len() == 11)
        .collect();
    wanted.sort();
    wanted.dedup();

    let mut found = HashMap::new();
    for chunk in wanted.chunks(ABN_CHUNK_SIZE) {
        let sql = format!(
            "SELECT ABN, ABN_STATUS, ABN_STATUS_FROM_DATE, MAIN_INDUSTRY_CODE, ENTITY_TYPE \
             FROM abr_cleaned WHERE ABN IN ({})",
            in_list(chunk)
        );
        for rec in source.query(&sql).await? {
            if let Some(entry) = AbrEntry::from_record(&rec) {
                found.insert(entry.abn.clone(), entry);
            }
        }
    }

    info!("ABR lookup matched {} of {} ABNs", found.len(), wanted.len());
    Ok(found)
}

fn column_value(data: ColumnData<'static>) -> Result<Value> {
    let value = match data {
        ColumnData::U8(v) => v.map(Value::from),
        ColumnData::I16(v) => v.map(Value::from),
        ColumnData::I32(v) => v.map(Value::from),
        ColumnData::I64(v) => v.map(Value::from),
        ColumnData::F32(v) => v.map(|f| Value::from(f as f64)),
        ColumnData::F64(v) => v.map(Value::from),
        ColumnData::Bit(v) => v.map(Value::from),
        ColumnData::String(v) => v.map(|s| Value::from(s.into_owned())),
        ColumnData::Guid(v) => v.map(|g| Value::from(g.to_string())),
        ColumnData::Numeric(v) => v.map(|n| Value::from(n.to_string())),
        data @ ColumnData::Date(_) => {
            NaiveDate::from_sql_owned(data)?.map(|d| Value::from(d.format("%Y-%m-%d").to_string()))
        }
        data @ (ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_)) => {
            NaiveDateTime::from_sql_owned(data)?
                .map(|dt| Value::from(dt.format("%Y-%m-%dT%H:%M:%S").to_string()))
        }
        _ => None,
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CsvSource;
    use std::fs;

    #[tokio::test]
    async fn test_lookup_abns_filters_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ABR_CLEANED.csv"),
            "ABN,ABN_STATUS,ABN_STATUS_FROM_DATE,MAIN_INDUSTRY_CODE,ENTITY_TYPE\n\
             51824753556,ACT,2001-07-01,6962,PRV\n",
        )
        .unwrap();
        let source = CsvSource::new(dir.path());

        let abns = vec![
            "51 824 753 556".to_string(),
            "51824753556".to_string(),
            "123".to_string(),
        ];
        let found = lookup_abns(&source, &abns).await.unwrap();

        let entry = &found["51824753556"];
        assert_eq!(entry.status.as_deref(), Some("ACT"));
        assert_eq!(entry.status_from, NaiveDate::from_ymd_opt(2001, 7, 1));
        assert_eq!(entry.industry_code.as_deref(), Some("6962"));
    }
}
