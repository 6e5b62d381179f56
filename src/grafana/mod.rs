//! Access to the dashboard service and its metrics proxy
//!
//! The alert engine only depends on the two traits below; [`GrafanaClient`]
//! is the HTTP implementation used by the binary.

pub mod client;

use async_trait::async_trait;

use crate::data::{Dashboard, DashboardSummary, MetricSeries, UnmonitorableDashboard};

pub use client::GrafanaClient;

/// Recent window requested for every metric fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWindow {
    pub from: String,
    pub until: String,
    pub max_data_points: u32,
}

impl Default for FetchWindow {
    fn default() -> Self {
        Self {
            from: "-60s".to_string(),
            until: "now".to_string(),
            max_data_points: 100,
        }
    }
}

/// Lists monitored dashboards and fetches their structure
#[async_trait]
pub trait DashboardSource: Send + Sync {
    /// Dashboards carrying the monitoring tag, in listing order
    async fn list_dashboards(&self) -> Result<Vec<DashboardSummary>, FetchError>;

    /// Rows and panels of one dashboard
    async fn fetch_dashboard(&self, summary: &DashboardSummary) -> Result<Dashboard, FetchError>;
}

/// Fetches recent samples for a metric query
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn fetch_series(
        &self,
        query: &str,
        window: &FetchWindow,
    ) -> Result<Vec<MetricSeries>, FetchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error(transparent)]
    Unmonitorable(#[from] UnmonitorableDashboard),

    #[error("HTTP client error: {0}")]
    Client(String),
}
