use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};

use super::{DashboardSource, FetchError, FetchWindow, MetricSource};
use crate::config::GrafanaConfig;
use crate::data::{parse_dashboard, Dashboard, DashboardSummary, MetricSeries};

const SEARCH_PATH: &str = "api/search";
const DASHBOARD_PATH: &str = "api/dashboards/db/";

/// HTTP client for the Grafana API
#[derive(Debug, Clone)]
pub struct GrafanaClient {
    http_client: reqwest::Client,
    /// Always ends with '/'
    base_url: String,
    token: Option<String>,
    monitoring_tag: String,
    search_limit: u32,
    datasource_id: u32,
}

impl GrafanaClient {
    pub fn new(config: &GrafanaConfig) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        let mut base_url = config.url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            http_client,
            base_url,
            token: Some(config.token.clone()).filter(|t| !t.is_empty()),
            monitoring_tag: config.monitoring_tag.clone(),
            search_limit: config.search_limit,
            datasource_id: config.datasource_id,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn search_request(&self) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, SEARCH_PATH);
        self.with_headers(self.http_client.get(url)).query(&[
            ("limit", self.search_limit.to_string()),
            ("query", String::new()),
            ("tag", self.monitoring_tag.clone()),
        ])
    }

    fn dashboard_request(&self, slug: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}{}", self.base_url, DASHBOARD_PATH, slug);
        self.with_headers(self.http_client.get(url))
    }

    fn render_request(&self, query: &str, window: &FetchWindow) -> reqwest::RequestBuilder {
        let url = format!(
            "{}api/datasources/proxy/{}/render",
            self.base_url, self.datasource_id
        );
        self.with_headers(self.http_client.post(url)).form(&[
            ("target", query.to_string()),
            ("from", window.from.clone()),
            ("until", window.until.clone()),
            ("format", "json".to_string()),
            ("maxDataPoints", window.max_data_points.to_string()),
        ])
    }

    fn with_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header(ACCEPT, "application/json");
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Send a request and return the body of a successful response
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, FetchError> {
        let request = request
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        let url = request.url().to_string();
        tracing::debug!(method = %request.method(), url = %url, "Grafana request");

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))
    }
}

#[async_trait]
impl DashboardSource for GrafanaClient {
    async fn list_dashboards(&self) -> Result<Vec<DashboardSummary>, FetchError> {
        let body = self.send(self.search_request()).await?;
        tracing::debug!("Dashboard search result: {}", body);
        serde_json::from_str(&body).map_err(|e| FetchError::Deserialization(e.to_string()))
    }

    async fn fetch_dashboard(&self, summary: &DashboardSummary) -> Result<Dashboard, FetchError> {
        let body = self.send(self.dashboard_request(summary.slug())).await?;
        Ok(parse_dashboard(&summary.title, &body)?)
    }
}

#[async_trait]
impl MetricSource for GrafanaClient {
    async fn fetch_series(
        &self,
        query: &str,
        window: &FetchWindow,
    ) -> Result<Vec<MetricSeries>, FetchError> {
        let body = self.send(self.render_request(query, window)).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Deserialization(e.to_string()))
    }
}
