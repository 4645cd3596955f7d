//! HTTP client for the DHIS2 organisation unit API

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Instant;

use super::models::{IdentifierMode, ImportStrategy, ImportSummary, OrgUnit, OrgUnitList};
use super::query::OrgUnitQuery;
use super::OrgUnitStore;
use crate::api::resilience::{ResilienceConfig, RetryPolicy};
use crate::error::{Side, SyncError, SyncResult, from_status, from_transport};

/// Basic-auth client for `<base_url>/organisationUnits` and `<base_url>/metadata`
#[derive(Debug, Clone)]
pub struct Dhis2Client {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    retry: RetryPolicy,
    resilience: ResilienceConfig,
}

impl Dhis2Client {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        resilience: ResilienceConfig,
    ) -> SyncResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = resilience.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build destination client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            retry: RetryPolicy::new(resilience.retry.clone()),
            resilience,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn log_request(&self, method: &str, url: &str) {
        if self.resilience.monitoring.request_logging {
            debug!("DHIS2 {} {}", method, url);
        }
    }

    fn log_duration(&self, label: &str, started: Instant) {
        if self.resilience.monitoring.performance_metrics {
            debug!("DHIS2 {} took {:?}", label, started.elapsed());
        }
    }

    async fn query_units(&self, query: &OrgUnitQuery) -> SyncResult<Vec<OrgUnit>> {
        let url = self.url("organisationUnits");
        let params = query.to_params();
        let (url, params) = (url.as_str(), params.as_slice());
        let started = Instant::now();

        let list: OrgUnitList = self
            .retry
            .execute("dhis2 org unit lookup", || async move {
                self.log_request("GET", url);
                let response = self
                    .http
                    .get(url)
                    .basic_auth(&self.username, Some(&self.password))
                    .query(&params)
                    .send()
                    .await
                    .map_err(|e| from_transport(Side::DestinationRead, e))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(from_status(Side::DestinationRead, status.as_u16(), &body));
                }
                response
                    .json::<OrgUnitList>()
                    .await
                    .map_err(|e| SyncError::destination_fetch(format!("invalid org unit list: {}", e)))
            })
            .await?;

        self.log_duration("lookup", started);
        Ok(list.organisation_units.into_iter().map(OrgUnit::from).collect())
    }

    async fn post_json(&self, label: &str, url: &str, params: &[(&str, &str)], body: &Value) -> SyncResult<Value> {
        let started = Instant::now();
        let value = self
            .retry
            .execute(label, || async move {
                self.log_request("POST", url);
                let response = self
                    .http
                    .post(url)
                    .basic_auth(&self.username, Some(&self.password))
                    .query(params)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| from_transport(Side::DestinationWrite, e))?;

                let status = response.status();
                let text = response
                    .text()
                    .await
                    .map_err(|e| from_transport(Side::DestinationWrite, e))?;

                // DHIS2 answers metadata imports with 409 plus a report when items are rejected
                if !status.is_success() && status.as_u16() != 409 {
                    return Err(from_status(Side::DestinationWrite, status.as_u16(), &text));
                }
                let value: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
                if !status.is_success() && value.is_null() {
                    return Err(from_status(Side::DestinationWrite, status.as_u16(), &text));
                }
                Ok(value)
            })
            .await?;
        self.log_duration(label, started);
        Ok(value)
    }
}

#[async_trait]
impl OrgUnitStore for Dhis2Client {
    async fn find_by_code(&self, code: &str) -> SyncResult<Option<OrgUnit>> {
        let units = self.query_units(&OrgUnitQuery::by_code(code)).await?;
        Ok(units.into_iter().next())
    }

    async fn find_by_name(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> SyncResult<Option<OrgUnit>> {
        let units = self.query_units(&OrgUnitQuery::by_name(name, parent_id)).await?;
        Ok(units.into_iter().next())
    }

    async fn create(&self, unit: &OrgUnit) -> SyncResult<String> {
        let url = self.url("organisationUnits");
        let value = self
            .post_json("dhis2 org unit create", &url, &[], &unit.to_payload())
            .await?;
        created_id(&value).ok_or_else(|| {
            SyncError::destination_write(format!(
                "create of '{}' returned no id: {}",
                unit.code,
                error_message(&value)
            ))
        })
    }

    async fn import(&self, units: &[OrgUnit], strategy: ImportStrategy) -> SyncResult<ImportSummary> {
        if units.is_empty() {
            return Ok(ImportSummary::default());
        }
        let url = self.url("metadata");
        let payloads: Vec<Value> = units.iter().map(OrgUnit::to_payload).collect();
        let body = json!({ "organisationUnits": payloads });
        // Updates address existing units by uid, creates by code
        let identifier = match strategy {
            ImportStrategy::CreateAndUpdate => IdentifierMode::Code,
            ImportStrategy::Update => IdentifierMode::Uid,
        };
        let params = [
            ("identifier", identifier.as_param()),
            ("importStrategy", strategy.as_param()),
        ];

        let report = self
            .post_json("dhis2 metadata import", &url, &params, &body)
            .await?;
        Ok(ImportSummary::from_report(&report, units))
    }
}

/// Extract the uid from either `{response: {uid}}` or the created object itself
fn created_id(value: &Value) -> Option<String> {
    value
        .pointer("/response/uid")
        .or_else(|| value.get("uid"))
        .or_else(|| value.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn error_message(value: &Value) -> String {
    value
        .pointer("/response/errorReports/0/message")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("no error message")
        .to_string()
}
