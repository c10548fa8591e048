//! Bulk API (v1, JSON) upserts

use super::client::check_status;
use super::types::{UpsertResult, UpsertTarget};
use crate::error::Result;
use crate::record::{self, Record};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConcurrencyMode {
    Serial,
    Parallel,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub id: String,
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInfo {
    pub id: String,
    pub job_id: String,
    pub state: String,
    #[serde(default)]
    pub state_message: Option<String>,
    #[serde(default)]
    pub number_records_processed: u64,
    #[serde(default)]
    pub number_records_failed: u64,
}

impl BatchInfo {
    pub fn is_finished(&self) -> bool {
        matches!(self.state.as_str(), "Completed" | "Failed" | "Not Processed")
    }
}

/// Per-record row of a batch result.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchResultRow {
    #[serde(default)]
    pub id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub created: bool,
    #[serde(default)]
    pub errors: Vec<BatchRecordError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecordError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status_code: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl BatchRecordError {
    pub fn describe(&self) -> String {
        if self.fields.is_empty() {
            format!("{}: {}", self.status_code, self.message)
        } else {
            format!("{}: {} [{}]", self.status_code, self.message, self.fields.join(", "))
        }
    }
}

pub struct BulkClient {
    http: reqwest::Client,
    instance_url: String,
    session_id: String,
    api_version: String,
    pub batch_size: usize,
    pub concurrency: ConcurrencyMode,
    pub poll_interval: Duration,
}

impl BulkClient {
    pub fn new(http: reqwest::Client, instance_url: String, session_id: String, api_version: String) -> Self {
        Self {
            http,
            instance_url,
            session_id,
            api_version,
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: ConcurrencyMode::Serial,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: ConcurrencyMode) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/services/async/{}/{}", self.instance_url, self.api_version, path)
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(&self, path: &str, body: &Value) -> Result<T> {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .header("X-SFDC-Session", &self.session_id)
            .json(body)
            .send()
            .await?;
        let response = check_status(response, &url).await?;
        Ok(response.json().await?)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let response = self
            .http
            .get(&url)
            .header("X-SFDC-Session", &self.session_id)
            .send()
            .await?;
        let response = check_status(response, &url).await?;
        Ok(response.json().await?)
    }

    async fn create_job(&self, object: &str, external_id_field: &str) -> Result<JobInfo> {
        let body = json!({
            "operation": "upsert",
            "object": object,
            "externalIdFieldName": external_id_field,
            "contentType": "JSON",
            "concurrencyMode": self.concurrency,
        });
        self.post_json("job", &body).await
    }

    async fn close_job(&self, job_id: &str) -> Result<JobInfo> {
        self.post_json(&format!("job/{}", job_id), &json!({"state": "Closed"}))
            .await
    }

    async fn add_batch(&self, job_id: &str, records: &[Record]) -> Result<BatchInfo> {
        let body = Value::Array(records.iter().cloned().map(Value::Object).collect());
        self.post_json(&format!("job/{}/batch", job_id), &body).await
    }

    async fn wait_for_batch(&self, job_id: &str, batch_id: &str) -> Result<BatchInfo> {
        loop {
            let info: BatchInfo = self
                .get_json(&format!("job/{}/batch/{}", job_id, batch_id))
                .await?;
            if info.is_finished() {
                return Ok(info);
            }
            debug!(batch = %batch_id, state = %info.state, "waiting for batch");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn batch_results(&self, job_id: &str, batch_id: &str) -> Result<Vec<BatchResultRow>> {
        self.get_json(&format!("job/{}/batch/{}/result", job_id, batch_id))
            .await
    }
}

#[async_trait]
impl UpsertTarget for BulkClient {
    async fn upsert(
        &self,
        object: &str,
        external_id_field: &str,
        records: &[Record],
    ) -> Result<Vec<UpsertResult>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let job = self.create_job(object, external_id_field).await?;
        info!(
            "Bulk job {} for {} ({} records, batch size {}, {:?})",
            job.id,
            object,
            records.len(),
            self.batch_size,
            self.concurrency
        );

        let chunks: Vec<&[Record]> = records.chunks(self.batch_size).collect();
        let mut batches = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            batches.push(self.add_batch(&job.id, chunk).await?);
        }
        self.close_job(&job.id).await?;

        let mut results = Vec::with_capacity(records.len());
        for (chunk, batch) in chunks.iter().zip(&batches) {
            let finished = self.wait_for_batch(&job.id, &batch.id).await?;
            let rows = if finished.state == "Completed" {
                self.batch_results(&job.id, &batch.id).await?
            } else {
                warn!(
                    "Batch {} ended {}: {}",
                    batch.id,
                    finished.state,
                    finished.state_message.as_deref().unwrap_or("")
                );
                Vec::new()
            };
            results.extend(assemble_results(chunk, &finished, rows, external_id_field));
        }

        Ok(results)
    }
}

/// Pair batch result rows with the records that produced them.
///
/// A batch that did not complete fails every one of its records with the
/// batch state message.
pub fn assemble_results(
    records: &[Record],
    batch: &BatchInfo,
    rows: Vec<BatchResultRow>,
    external_id_field: &str,
) -> Vec<UpsertResult> {
    if batch.state != "Completed" {
        let message = format!(
            "Batch {}: {}",
            batch.state,
            batch.state_message.as_deref().unwrap_or("no message")
        );
        return records
            .iter()
            .map(|r| UpsertResult::failed(record::text(r, external_id_field), message.clone()))
            .collect();
    }

    let mut rows = rows.into_iter();
    records
        .iter()
        .map(|r| {
            let external_id = record::text(r, external_id_field);
            match rows.next() {
                Some(row) => UpsertResult {
                    external_id,
                    sf_id: row.id.filter(|id| !id.is_empty()),
                    success: row.success,
                    created: row.created,
                    errors: row.errors.iter().map(BatchRecordError::describe).collect(),
                },
                None => UpsertResult::failed(external_id, "No result returned for record"),
            }
        })
        .collect()
}
