//! Oracle connection to the CO schema

use super::{ensure_identifier, sql_literal, SourceDatabase};
use crate::config::OracleSettings;
use crate::error::{MigrationError, Result};
use crate::metadata::OracleColumn;
use crate::record::{self, Record};
use ::oracle::sql_type::OracleType;
use ::oracle::{Connection, Row};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub struct OracleSource {
    conn: Arc<Mutex<Connection>>,
}

impl OracleSource {
    pub async fn connect(settings: &OracleSettings) -> Result<Self> {
        let settings = settings.clone();
        info!("Connecting to Oracle {}", settings.connect_string());
        let conn = tokio::task::spawn_blocking(move || {
            Connection::connect(&settings.user, &settings.password, settings.connect_string())
        })
        .await
        .map_err(|e| MigrationError::Oracle(format!("connect task failed: {}", e)))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Column definitions from `ALL_TAB_COLUMNS`, with up to `samples` distinct values each.
    pub async fn table_columns(&self, table: &str, samples: usize) -> Result<Vec<OracleColumn>> {
        let table = ensure_identifier(table)?.to_ascii_uppercase();
        let (owner, name) = match table.split_once('.') {
            Some((owner, name)) => (Some(owner.to_string()), name.to_string()),
            None => (None, table.clone()),
        };

        let mut sql = format!(
            "SELECT COLUMN_NAME, DATA_TYPE, DATA_LENGTH, NULLABLE FROM ALL_TAB_COLUMNS WHERE TABLE_NAME = {}",
            sql_literal(&name)
        );
        if let Some(owner) = &owner {
            sql.push_str(&format!(" AND OWNER = {}", sql_literal(owner)));
        }
        sql.push_str(" ORDER BY COLUMN_ID");

        let rows = self.query(&sql).await?;
        if rows.is_empty() {
            return Err(MigrationError::Oracle(format!("Table {} not found or not visible", table)));
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let column_name = record::text(&row, "COLUMN_NAME").unwrap_or_default();
            let data_type = record::text(&row, "DATA_TYPE").unwrap_or_default();
            let values = if samples > 0 && !data_type.contains("LOB") {
                self.sample_values(&table, &column_name, samples).await?
            } else {
                Vec::new()
            };
            columns.push(OracleColumn {
                table: name.clone(),
                name: column_name,
                data_type,
                length: record::integer(&row, "DATA_LENGTH").map(|l| l as u32),
                nullable: record::text(&row, "NULLABLE").as_deref() != Some("N"),
                samples: values,
            });
        }

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    /// Distinct non-null values of one column.
    pub async fn sample_values(&self, table: &str, column: &str, limit: usize) -> Result<Vec<String>> {
        let table = ensure_identifier(table)?;
        let column = ensure_identifier(column)?;
        let sql = format!(
            "SELECT DISTINCT \"{col}\" AS V FROM {table} WHERE \"{col}\" IS NOT NULL FETCH FIRST {limit} ROWS ONLY",
            col = column,
            table = table,
            limit = limit
        );
        let rows = self.query(&sql).await?;
        Ok(rows.iter().filter_map(|r| record::text(r, "V")).collect())
    }

    pub async fn count(&self, table: &str) -> Result<u64> {
        let table = ensure_identifier(table)?;
        let rows = self.query(&format!("SELECT COUNT(*) AS N FROM {}", table)).await?;
        Ok(rows
            .first()
            .and_then(|r| record::integer(r, "N"))
            .unwrap_or(0) as u64)
    }
}

#[async_trait]
impl SourceDatabase for OracleSource {
    fn name(&self) -> &str {
        "oracle"
    }

    async fn query(&self, sql: &str) -> Result<Vec<Record>> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();

        // The driver is blocking; keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| MigrationError::Oracle("connection lock poisoned".to_string()))?;
            run_query(&conn, &sql)
        })
        .await
        .map_err(|e| MigrationError::Oracle(format!("query task failed: {}", e)))?
    }
}

fn run_query(conn: &Connection, sql: &str) -> Result<Vec<Record>> {
    debug!("oracle: {}", sql);
    let rows = conn.query(sql, &[])?;
    let columns: Vec<(String, OracleType)> = rows
        .column_info()
        .iter()
        .map(|c| (c.name().to_string(), c.oracle_type().clone()))
        .collect();

    let mut out = Vec::new();
    for row in rows {
        let row = row?;
        let mut rec = Record::new();
        for (idx, (name, oracle_type)) in columns.iter().enumerate() {
            rec.insert(name.clone(), column_value(&row, idx, oracle_type)?);
        }
        out.push(rec);
    }
    Ok(out)
}

fn column_value(row: &Row, idx: usize, oracle_type: &OracleType) -> Result<Value> {
    let value = match oracle_type {
        OracleType::Number(_, _)
        | OracleType::Float(_)
        | OracleType::BinaryFloat
        | OracleType::BinaryDouble
        | OracleType::Int64
        | OracleType::UInt64 => row
            .get::<_, Option<String>>(idx)?
            .map(|s| number_value(&s)),
        OracleType::Date | OracleType::Timestamp(_) => row
            .get::<_, Option<chrono::NaiveDateTime>>(idx)?
            .map(|dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string())),
        _ => row.get::<_, Option<String>>(idx)?.map(Value::String),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Oracle renders NUMBER as text exactly; keep integers integral.
fn number_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(trimmed.to_string()))
}
