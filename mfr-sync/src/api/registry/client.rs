//! HTTP client for the Resource Map registry API

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Instant;

use super::models::{Collection, Layer, RawSite, SitePage};
use super::{PageCursor, SourceRegistry};
use crate::api::resilience::{ResilienceConfig, RetryPolicy};
use crate::error::{Side, SyncError, SyncResult, from_status, from_transport};
use crate::sync::StreamKind;

/// Basic-auth client for the registry's `/collections` and `/sites` endpoints
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    retry: RetryPolicy,
    resilience: ResilienceConfig,
}

impl RegistryClient {
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
            .map_err(|e| SyncError::Config(format!("failed to build registry client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            retry: RetryPolicy::new(resilience.retry.clone()),
            resilience,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// URL and query parameters for a page cursor
    pub fn page_request(&self, cursor: &PageCursor) -> (String, Vec<(String, String)>) {
        match cursor {
            PageCursor::First {
                collection_id,
                stream,
                since,
            } => {
                let filter = match stream {
                    StreamKind::Added => "created_since",
                    StreamKind::Updated => "updated_since",
                };
                (
                    self.url(&format!("collections/{}.json", collection_id)),
                    vec![
                        (filter.to_string(), since.clone()),
                        ("page".to_string(), "1".to_string()),
                    ],
                )
            }
            PageCursor::Next(url) => (url.clone(), Vec::new()),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        label: &str,
        url: &str,
        params: &[(String, String)],
    ) -> SyncResult<T> {
        let started = Instant::now();
        let value = self
            .retry
            .execute(label, || async move {
                if self.resilience.monitoring.request_logging {
                    debug!("Registry GET {} {:?}", url, params);
                }
                let response = self
                    .http
                    .get(url)
                    .basic_auth(&self.username, Some(&self.password))
                    .query(params)
                    .send()
                    .await
                    .map_err(|e| from_transport(Side::Source, e))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(from_status(Side::Source, status.as_u16(), &body));
                }
                response
                    .json::<T>()
                    .await
                    .map_err(|e| SyncError::source_fetch(format!("invalid response from {}: {}", url, e)))
            })
            .await?;

        if self.resilience.monitoring.performance_metrics {
            debug!("Registry {} took {:?}", label, started.elapsed());
        }
        Ok(value)
    }
}

#[async_trait]
impl SourceRegistry for RegistryClient {
    async fn collections(&self) -> SyncResult<Vec<Collection>> {
        let url = self.url("collections");
        self.get_json("registry collections", &url, &[]).await
    }

    async fn layers(&self, collection_id: &str) -> SyncResult<Vec<Layer>> {
        let url = self.url(&format!("collections/{}/fields.json", collection_id));
        self.get_json("registry fields", &url, &[]).await
    }

    async fn fetch_page(&self, cursor: &PageCursor) -> SyncResult<SitePage> {
        let (url, params) = self.page_request(cursor);
        self.get_json("registry site page", &url, &params).await
    }

    async fn site(&self, site_id: &str) -> SyncResult<RawSite> {
        let url = self.url(&format!("sites/{}.json", site_id));
        self.get_json("registry site", &url, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RegistryClient {
        RegistryClient::new(
            "https://resourcemap.example.org/api/",
            "user",
            "pass",
            ResilienceConfig::disabled(),
        )
        .unwrap()
    }

    #[test]
    fn test_first_page_request() {
        let cursor = PageCursor::first("17", StreamKind::Updated, "2024-01-01T00:00:00Z");
        let (url, params) = client().page_request(&cursor);
        assert_eq!(url, "https://resourcemap.example.org/api/collections/17.json");
        assert_eq!(
            params,
            vec![
                ("updated_since".to_string(), "2024-01-01T00:00:00Z".to_string()),
                ("page".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_next_page_request_is_opaque() {
        let cursor = PageCursor::Next("https://resourcemap.example.org/api/collections/17.json?page=2".into());
        let (url, params) = client().page_request(&cursor);
        assert!(url.ends_with("page=2"));
        assert!(params.is_empty());
    }
}
