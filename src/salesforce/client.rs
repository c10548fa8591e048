use super::bulk::BulkClient;
use super::types::{DescribeResponse, QueryResponse};
use crate::config::SalesforceSettings;
use crate::error::{MigrationError, Result};
use crate::metadata::SObjectSchema;
use crate::record::{strip_attributes, Record};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

lazy_static! {
    static ref SESSION_ID: Regex = Regex::new(r"<sessionId>([^<]+)</sessionId>").unwrap();
    static ref SERVER_URL: Regex = Regex::new(r"<serverUrl>(https://[^/<]+)[^<]*</serverUrl>").unwrap();
    static ref FAULT: Regex = Regex::new(r"<faultstring>([^<]*)</faultstring>").unwrap();
}

/// Authenticated REST session against one org.
#[derive(Clone)]
pub struct SalesforceClient {
    http: reqwest::Client,
    instance_url: String,
    session_id: String,
    api_version: String,
}

impl SalesforceClient {
    /// SOAP username/password login (password + security token, no connected app needed).
    pub async fn login(settings: &SalesforceSettings) -> Result<Self> {
        let http = reqwest::Client::new();
        let url = settings.login_url();
        info!("Logging in to Salesforce as {} ({})", settings.username, settings.domain);

        let response = http
            .post(&url)
            .header("Content-Type", "text/xml; charset=UTF-8")
            .header("SOAPAction", "login")
            .body(login_envelope(
                &settings.username,
                &settings.password,
                &settings.security_token,
            ))
            .send()
            .await
            .map_err(|e| MigrationError::Salesforce(format!("Login request failed: {}", e)))?;

        let body = response.text().await?;
        let (session_id, instance_url) = parse_login_response(&body)?;
        info!("Logged in to {}", instance_url);

        Ok(Self::from_session(instance_url, session_id, settings.api_version.clone()))
    }

    pub fn from_session(instance_url: String, session_id: String, api_version: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            instance_url: instance_url.trim_end_matches('/').to_string(),
            session_id,
            api_version,
        }
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Bulk API client sharing this session.
    pub fn bulk(&self) -> BulkClient {
        BulkClient::new(
            self.http.clone(),
            self.instance_url.clone(),
            self.session_id.clone(),
            self.api_version.clone(),
        )
    }

    fn data_url(&self, path: &str) -> String {
        format!(
            "{}/services/data/v{}/{}",
            self.instance_url,
            self.api_version,
            path.trim_start_matches('/')
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.session_id)
            .query(query)
            .send()
            .await?;
        let response = check_status(response, url).await?;
        Ok(response.json().await?)
    }

    /// First page of a SOQL query.
    pub async fn query(&self, soql: &str) -> Result<QueryResponse> {
        let mut page: QueryResponse = self.get_json(&self.data_url("query"), &[("q", soql)]).await?;
        page.records = page.records.into_iter().map(strip_attributes).collect();
        Ok(page)
    }

    /// Every record of a SOQL query, following `nextRecordsUrl`.
    pub async fn query_all(&self, soql: &str) -> Result<Vec<Record>> {
        let mut page = self.query(soql).await?;
        let mut records = std::mem::take(&mut page.records);

        while let Some(next) = page.next_records_url.take() {
            let url = format!("{}{}", self.instance_url, next);
            page = self.get_json(&url, &[]).await?;
            records.extend(page.records.drain(..).map(strip_attributes));
            debug!("Fetched {} of {} records", records.len(), page.total_size);
        }

        Ok(records)
    }

    /// `SELECT COUNT() FROM object [WHERE ...]`
    pub async fn count(&self, object: &str, where_clause: Option<&str>) -> Result<u64> {
        let mut soql = format!("SELECT COUNT() FROM {}", object);
        if let Some(clause) = where_clause {
            soql.push_str(" WHERE ");
            soql.push_str(clause);
        }
        Ok(self.query(&soql).await?.total_size)
    }

    pub async fn describe(&self, object: &str) -> Result<SObjectSchema> {
        let url = self.data_url(&format!("sobjects/{}/describe", object));
        let describe: DescribeResponse = self.get_json(&url, &[]).await?;
        Ok(describe.into())
    }
}

pub(crate) async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = format!("{} returned {}: {}", what, status, body);
    Err(if status == StatusCode::UNAUTHORIZED {
        MigrationError::Salesforce(format!("Session rejected, log in again. {}", message))
    } else {
        MigrationError::Salesforce(message)
    })
}

pub fn login_envelope(username: &str, password: &str, security_token: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8" ?>
<env:Envelope xmlns:xsd="http://www.w3.org/2001/XMLSchema"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
    xmlns:env="http://schemas.xmlsoap.org/soap/envelope/"
    xmlns:urn="urn:partner.soap.sforce.com">
  <env:Header>
    <urn:CallOptions><urn:client>co-migration</urn:client></urn:CallOptions>
  </env:Header>
  <env:Body>
    <n1:login xmlns:n1="urn:partner.soap.sforce.com">
      <n1:username>{}</n1:username>
      <n1:password>{}{}</n1:password>
    </n1:login>
  </env:Body>
</env:Envelope>"#,
        xml_escape(username),
        xml_escape(password),
        xml_escape(security_token)
    )
}

/// Session id and instance URL from a SOAP login response.
pub fn parse_login_response(body: &str) -> Result<(String, String)> {
    if let Some(fault) = FAULT.captures(body) {
        return Err(MigrationError::Salesforce(format!("Login failed: {}", &fault[1])));
    }
    let session = SESSION_ID
        .captures(body)
        .map(|c| c[1].to_string())
        .ok_or_else(|| MigrationError::Salesforce("Login response has no sessionId".to_string()))?;
    let instance = SERVER_URL
        .captures(body)
        .map(|c| c[1].to_string())
        .ok_or_else(|| MigrationError::Salesforce("Login response has no serverUrl".to_string()))?;
    Ok((session, instance))
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
