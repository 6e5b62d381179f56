//! Top-level driver for one alerting run

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use super::checker::AlertChecker;
use super::compiler::{CompileError, DashboardRuleCompiler};
use super::notifier::AlertSink;
use super::result::AlertEvaluationResult;
use crate::data::DashboardSummary;
use crate::grafana::{DashboardSource, FetchError, MetricSource};

/// Counters for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub dashboards_seen: usize,
    pub dashboards_skipped: usize,
    pub checkers_failed: usize,
    pub results_reported: usize,
}

/// Lists monitored dashboards, compiles their checkers, evaluates them and
/// hands each dashboard's results to the sink
pub struct AlertCheckerCoordinator {
    dashboards: Arc<dyn DashboardSource>,
    metrics: Arc<dyn MetricSource>,
    sink: Arc<dyn AlertSink>,
    compiler: DashboardRuleCompiler,
    fetch_concurrency: usize,
}

impl AlertCheckerCoordinator {
    pub fn new(
        dashboards: Arc<dyn DashboardSource>,
        metrics: Arc<dyn MetricSource>,
        sink: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            dashboards,
            metrics,
            sink,
            compiler: DashboardRuleCompiler::default(),
            fetch_concurrency: 1,
        }
    }

    pub fn with_compiler(mut self, compiler: DashboardRuleCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    /// Number of checkers fetched at once; results keep panel order regardless
    pub fn with_fetch_concurrency(mut self, fetch_concurrency: usize) -> Self {
        self.fetch_concurrency = fetch_concurrency.max(1);
        self
    }

    /// Process every monitored dashboard once.
    ///
    /// Only a failure to list dashboards aborts the run; anything going wrong
    /// inside a dashboard is logged and that dashboard (or checker) skipped.
    pub async fn run(&self) -> Result<RunSummary, CoordinatorError> {
        let listing = self
            .dashboards
            .list_dashboards()
            .await
            .map_err(CoordinatorError::Listing)?;
        tracing::debug!("Dashboard data list: {:?}", listing);

        let mut summary = RunSummary::default();

        for dashboard in &listing {
            summary.dashboards_seen += 1;
            tracing::info!(dashboard = %dashboard.title, "Processing dashboard");

            let (results, failed) = match self.process_dashboard(dashboard).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(
                        dashboard = %dashboard.title,
                        error = %e,
                        "Dashboard cannot be monitored, skipping"
                    );
                    summary.dashboards_skipped += 1;
                    continue;
                }
            };
            summary.checkers_failed += failed;

            if results.is_empty() {
                continue;
            }
            summary.results_reported += results.len();
            if let Err(e) = self.sink.report(&results).await {
                tracing::error!(dashboard = %dashboard.title, error = %e, "Failed to report alerts");
            }
        }

        Ok(summary)
    }

    /// Compile and evaluate one dashboard. Returns its results and the number
    /// of checkers whose fetch failed.
    async fn process_dashboard(
        &self,
        summary: &DashboardSummary,
    ) -> Result<(Vec<AlertEvaluationResult>, usize), DashboardError> {
        let dashboard = self.dashboards.fetch_dashboard(summary).await?;
        let checkers = self.compiler.compile(&dashboard)?;
        tracing::debug!(dashboard = %summary.title, "Alert checkers: {}", checkers.len());

        let monitorable: Vec<AlertChecker> = checkers
            .into_iter()
            .filter(|checker| {
                if !checker.has_rules() {
                    tracing::info!(
                        dashboard = %summary.title,
                        panel = %checker.panel_title(),
                        "No alert rules in panel row, not monitored"
                    );
                }
                checker.has_rules()
            })
            .collect();

        let metrics = self.metrics.as_ref();
        let checked: Vec<Option<AlertChecker>> = stream::iter(monitorable)
            .map(|mut checker| async move {
                match checker.check(metrics).await {
                    Ok(()) => Some(checker),
                    Err(e) => {
                        tracing::error!(
                            dashboard = %summary.title,
                            panel = %checker.panel_title(),
                            error = %e,
                            "Metric fetch failed, skipping panel"
                        );
                        None
                    }
                }
            })
            .buffered(self.fetch_concurrency)
            .collect()
            .await;

        let mut results = Vec::new();
        let mut failed = 0;
        for checker in checked {
            let Some(checker) = checker else {
                failed += 1;
                continue;
            };
            match checker.evaluate() {
                Ok(evaluated) => results.extend(evaluated),
                Err(e) => {
                    failed += 1;
                    tracing::error!(
                        dashboard = %summary.title,
                        panel = %checker.panel_title(),
                        error = %e,
                        "Alert evaluation failed"
                    );
                }
            }
        }

        Ok((results, failed))
    }
}

/// Reasons a single dashboard is skipped
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Failed to list monitored dashboards: {0}")]
    Listing(FetchError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::checker::tests::FakeMetrics;
    use crate::alerts::notifier::NotifierError;
    use crate::data::{parse_dashboard, Dashboard, DataPoint, MetricSeries};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Dashboards served from raw detail payloads keyed by slug
    #[derive(Default)]
    struct FakeDashboards {
        listing: Vec<DashboardSummary>,
        payloads: HashMap<String, String>,
    }

    impl FakeDashboards {
        fn with(mut self, title: &str, slug: &str, payload: &str) -> Self {
            self.listing.push(DashboardSummary::new(title, slug));
            self.payloads.insert(slug.to_string(), payload.to_string());
            self
        }
    }

    #[async_trait]
    impl DashboardSource for FakeDashboards {
        async fn list_dashboards(&self) -> Result<Vec<DashboardSummary>, FetchError> {
            Ok(self.listing.clone())
        }

        async fn fetch_dashboard(&self, summary: &DashboardSummary) -> Result<Dashboard, FetchError> {
            let raw = self.payloads.get(summary.slug()).ok_or(FetchError::Status {
                status: 404,
                url: summary.slug().to_string(),
            })?;
            Ok(parse_dashboard(&summary.title, raw)?)
        }
    }

    struct FailingListing;

    #[async_trait]
    impl DashboardSource for FailingListing {
        async fn list_dashboards(&self) -> Result<Vec<DashboardSummary>, FetchError> {
            Err(FetchError::Status {
                status: 401,
                url: "api/search".to_string(),
            })
        }

        async fn fetch_dashboard(&self, _summary: &DashboardSummary) -> Result<Dashboard, FetchError> {
            unreachable!("listing failed")
        }
    }

    /// Records every batch it receives
    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<AlertEvaluationResult>>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn report(&self, results: &[AlertEvaluationResult]) -> Result<(), NotifierError> {
            self.batches.lock().push(results.to_vec());
            Ok(())
        }

        fn channel_name(&self) -> &str {
            "recording"
        }
    }

    const SERVERS: &str = r#"{"dashboard": {"rows": [{"panels": [
        {"title": "CPU", "type": "graph", "targets": [{"target": "cpu"}]},
        {"title": "alerts", "type": "text", "content": "x<50; normal; ops@example.com\n50<=x; critical; ops@example.com"},
        {"title": "Memory", "type": "singlestat", "targets": [{"target": "mem"}]}
    ]}]}}"#;

    fn metrics() -> FakeMetrics {
        FakeMetrics::default()
            .with("cpu", vec![MetricSeries::new("web-1", vec![DataPoint(Some(90.0), 1)])])
            .with("mem", vec![MetricSeries::new("web-1", vec![DataPoint(Some(10.0), 1)])])
    }

    fn coordinator(
        dashboards: FakeDashboards,
        metrics: FakeMetrics,
        sink: Arc<RecordingSink>,
    ) -> AlertCheckerCoordinator {
        AlertCheckerCoordinator::new(Arc::new(dashboards), Arc::new(metrics), sink)
    }

    #[tokio::test]
    async fn test_results_reported_per_dashboard_in_panel_order() {
        let sink = Arc::new(RecordingSink::default());
        let dashboards = FakeDashboards::default().with("Servers", "servers", SERVERS);

        let summary = coordinator(dashboards, metrics(), Arc::clone(&sink))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.dashboards_seen, 1);
        assert_eq!(summary.results_reported, 2);

        let batches = sink.batches.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].panel_title, "CPU");
        assert_eq!(batches[0][0].current_value, 90.0);
        assert!(batches[0][0].outcomes[1].triggered);
        assert_eq!(batches[0][1].panel_title, "Memory");
        assert!(batches[0][1].outcomes[0].triggered);
    }

    #[tokio::test]
    async fn test_unparseable_dashboard_skipped() {
        let sink = Arc::new(RecordingSink::default());
        let dashboards = FakeDashboards::default()
            .with("Broken", "broken", "{\"dashboard\": {\"rows\": [")
            .with("Servers", "servers", SERVERS);

        let summary = coordinator(dashboards, metrics(), Arc::clone(&sink))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.dashboards_seen, 2);
        assert_eq!(summary.dashboards_skipped, 1);
        assert_eq!(sink.batches.lock().len(), 1);
        assert_eq!(sink.batches.lock()[0][0].panel_title, "CPU");
    }

    #[tokio::test]
    async fn test_malformed_rules_skip_dashboard() {
        let sink = Arc::new(RecordingSink::default());
        let bad_rules = r#"{"dashboard": {"rows": [{"panels": [
            {"title": "CPU", "type": "graph", "targets": [{"target": "cpu"}]},
            {"title": "alerts", "type": "text", "content": "x>50; critical; ops@example.com"}
        ]}]}}"#;
        let dashboards = FakeDashboards::default()
            .with("Bad", "bad", bad_rules)
            .with("Servers", "servers", SERVERS);

        let summary = coordinator(dashboards, metrics(), Arc::clone(&sink))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.dashboards_skipped, 1);
        assert_eq!(sink.batches.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_panels_without_rules_are_not_fetched() {
        let sink = Arc::new(RecordingSink::default());
        let no_rules = r#"{"dashboard": {"rows": [{"panels": [
            {"title": "CPU", "type": "graph", "targets": [{"target": "cpu"}]}
        ]}]}}"#;
        let dashboards = FakeDashboards::default().with("Plain", "plain", no_rules);
        let metrics = Arc::new(metrics());

        let summary = AlertCheckerCoordinator::new(
            Arc::new(dashboards),
            Arc::clone(&metrics) as Arc<dyn MetricSource>,
            Arc::clone(&sink) as Arc<dyn AlertSink>,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(summary, RunSummary { dashboards_seen: 1, ..RunSummary::default() });
        assert!(metrics.requested.lock().is_empty());
        assert!(sink.batches.lock().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_sibling_panels() {
        let sink = Arc::new(RecordingSink::default());
        let dashboards = FakeDashboards::default().with("Servers", "servers", SERVERS);

        let summary = coordinator(dashboards, metrics().failing("cpu"), Arc::clone(&sink))
            .with_fetch_concurrency(4)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.checkers_failed, 1);
        let batches = sink.batches.lock();
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].panel_title, "Memory");
    }

    #[tokio::test]
    async fn test_parallel_fetch_preserves_order() {
        let sink = Arc::new(RecordingSink::default());
        let dashboards = FakeDashboards::default().with("Servers", "servers", SERVERS);

        coordinator(dashboards, metrics(), Arc::clone(&sink))
            .with_fetch_concurrency(8)
            .run()
            .await
            .unwrap();

        let titles: Vec<_> = sink.batches.lock()[0]
            .iter()
            .map(|r| r.panel_title.clone())
            .collect();
        assert_eq!(titles, vec!["CPU", "Memory"]);
    }

    #[tokio::test]
    async fn test_empty_listing_is_noop() {
        let sink = Arc::new(RecordingSink::default());
        let summary = coordinator(FakeDashboards::default(), metrics(), Arc::clone(&sink))
            .run()
            .await
            .unwrap();

        assert_eq!(summary, RunSummary::default());
        assert!(sink.batches.lock().is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_run() {
        let sink: Arc<dyn AlertSink> = Arc::new(RecordingSink::default());
        let coordinator =
            AlertCheckerCoordinator::new(Arc::new(FailingListing), Arc::new(metrics()), sink);

        assert!(matches!(
            coordinator.run().await,
            Err(CoordinatorError::Listing(FetchError::Status { status: 401, .. }))
        ));
    }
}
