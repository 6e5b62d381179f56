//! Per-panel alert checker

use std::sync::Arc;

use super::aggregate::current_value;
use super::result::{AlertEvaluationResult, RuleOutcome};
use crate::data::{MetricSeries, MetricTarget};
use crate::grafana::{FetchError, FetchWindow, MetricSource};
use crate::rules::AlertRuleSet;

/// Binds a panel's metric targets to the rule set of its row.
///
/// Single use: [`check`](Self::check) fetches data, then
/// [`evaluate`](Self::evaluate) applies the rules to it.
#[derive(Debug, Clone)]
pub struct AlertChecker {
    panel_title: String,
    targets: Vec<MetricTarget>,
    rule_set: Option<Arc<AlertRuleSet>>,
    window: FetchWindow,
    fetched_series: Vec<MetricSeries>,
    checked: bool,
}

impl AlertChecker {
    pub fn new(panel_title: impl Into<String>, targets: Vec<MetricTarget>) -> Self {
        Self {
            panel_title: panel_title.into(),
            targets,
            rule_set: None,
            window: FetchWindow::default(),
            fetched_series: Vec::new(),
            checked: false,
        }
    }

    pub fn with_window(mut self, window: FetchWindow) -> Self {
        self.window = window;
        self
    }

    pub fn set_rule_set(&mut self, rule_set: Arc<AlertRuleSet>) {
        self.rule_set = Some(rule_set);
    }

    pub fn rule_set(&self) -> Option<&Arc<AlertRuleSet>> {
        self.rule_set.as_ref()
    }

    pub fn has_rules(&self) -> bool {
        self.rule_set.is_some()
    }

    pub fn panel_title(&self) -> &str {
        &self.panel_title
    }

    pub fn targets(&self) -> &[MetricTarget] {
        &self.targets
    }

    pub fn fetched_series(&self) -> &[MetricSeries] {
        &self.fetched_series
    }

    pub fn has_checked(&self) -> bool {
        self.checked
    }

    /// Fetch the recent window for every visible target.
    ///
    /// Calling again replaces previously fetched data.
    pub async fn check(&mut self, source: &dyn MetricSource) -> Result<(), CheckError> {
        let mut fetched = Vec::new();

        for target in self.targets.iter().filter(|t| !t.hidden) {
            tracing::debug!(panel = %self.panel_title, target = %target.query, "Fetching metric");
            let series = source.fetch_series(&target.query, &self.window).await?;
            fetched.extend(series);
        }

        self.fetched_series = fetched;
        self.checked = true;
        Ok(())
    }

    /// Evaluate the rule set against each fetched series
    pub fn evaluate(&self) -> Result<Vec<AlertEvaluationResult>, CheckError> {
        if !self.checked {
            return Err(CheckError::Precondition(format!(
                "check() was not invoked on panel '{}', there is nothing to evaluate",
                self.panel_title
            )));
        }
        let rule_set = self.rule_set.as_ref().ok_or_else(|| {
            CheckError::Precondition(format!(
                "no alert rules attached to panel '{}'",
                self.panel_title
            ))
        })?;

        let evaluated_at = chrono::Utc::now();
        let results = self
            .fetched_series
            .iter()
            .map(|series| {
                let x = current_value(&series.points);
                AlertEvaluationResult {
                    panel_title: self.panel_title.clone(),
                    target_label: series.label.clone(),
                    current_value: x,
                    outcomes: rule_set.evaluate(x).into_iter().map(RuleOutcome::from).collect(),
                    evaluated_at,
                }
            })
            .collect();

        Ok(results)
    }
}

/// Alert check errors
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::DataPoint;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// In-memory metric source keyed by query
    #[derive(Default)]
    pub(crate) struct FakeMetrics {
        pub series: HashMap<String, Vec<MetricSeries>>,
        pub failing: Vec<String>,
        pub requested: Mutex<Vec<String>>,
    }

    impl FakeMetrics {
        pub fn with(mut self, query: &str, series: Vec<MetricSeries>) -> Self {
            self.series.insert(query.to_string(), series);
            self
        }

        pub fn failing(mut self, query: &str) -> Self {
            self.failing.push(query.to_string());
            self
        }
    }

    #[async_trait]
    impl MetricSource for FakeMetrics {
        async fn fetch_series(
            &self,
            query: &str,
            window: &FetchWindow,
        ) -> Result<Vec<MetricSeries>, FetchError> {
            assert_eq!(window.from, "-60s");
            self.requested.lock().push(query.to_string());
            if self.failing.iter().any(|q| q == query) {
                return Err(FetchError::Network("connection refused".to_string()));
            }
            Ok(self.series.get(query).cloned().unwrap_or_default())
        }
    }

    fn series(label: &str, values: &[Option<f64>]) -> MetricSeries {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| DataPoint(*v, i as i64))
            .collect();
        MetricSeries::new(label, points)
    }

    fn rules(text: &str) -> Arc<AlertRuleSet> {
        Arc::new(AlertRuleSet::parse(text).unwrap())
    }

    #[test]
    fn test_evaluate_before_check_fails() {
        let mut checker = AlertChecker::new("CPU", vec![MetricTarget::new("cpu")]);
        checker.set_rule_set(rules("x<1; normal; a@b.com"));

        assert!(matches!(checker.evaluate(), Err(CheckError::Precondition(_))));
    }

    #[tokio::test]
    async fn test_evaluate_without_rules_fails() {
        let metrics = FakeMetrics::default().with("cpu", vec![series("web-1", &[Some(1.0)])]);
        let mut checker = AlertChecker::new("CPU", vec![MetricTarget::new("cpu")]);

        checker.check(&metrics).await.unwrap();
        assert!(checker.has_checked());
        assert!(matches!(checker.evaluate(), Err(CheckError::Precondition(_))));
    }

    #[tokio::test]
    async fn test_one_result_per_series() {
        let metrics = FakeMetrics::default().with(
            "servers.*.load",
            vec![
                series("web-1", &[Some(10.0), None, Some(20.0)]),
                series("web-2", &[Some(80.0), Some(90.0)]),
                series("web-3", &[None, None]),
            ],
        );
        let mut checker = AlertChecker::new("Load", vec![MetricTarget::new("servers.*.load")]);
        checker.set_rule_set(rules(
            "x<50; normal; ops@example.com\n50<=x; critical; ops@example.com; High load",
        ));

        checker.check(&metrics).await.unwrap();
        let results = checker.evaluate().unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].target_label, "web-1");
        assert_eq!(results[0].current_value, 15.0);
        assert!(results[0].outcomes[0].triggered);
        assert!(!results[0].outcomes[1].triggered);

        assert_eq!(results[1].current_value, 85.0);
        assert!(!results[1].outcomes[0].triggered);
        assert!(results[1].outcomes[1].triggered);
        assert_eq!(results[1].outcomes[1].rule_name, "critical");
        assert_eq!(results[1].outcomes[1].short_description, "High load");

        assert!(!results[2].has_data());
        assert_eq!(results[2].triggered().count(), 0);
    }

    #[tokio::test]
    async fn test_hidden_targets_not_fetched() {
        let metrics = FakeMetrics::default()
            .with("visible", vec![series("a", &[Some(1.0)])])
            .with("hidden", vec![series("b", &[Some(1.0)])]);
        let hidden = MetricTarget {
            query: "hidden".to_string(),
            hidden: true,
        };
        let mut checker = AlertChecker::new("Mixed", vec![MetricTarget::new("visible"), hidden]);

        checker.check(&metrics).await.unwrap();

        assert_eq!(*metrics.requested.lock(), vec!["visible".to_string()]);
        assert_eq!(checker.fetched_series().len(), 1);
    }

    #[tokio::test]
    async fn test_recheck_replaces_series() {
        let metrics = FakeMetrics::default().with("cpu", vec![series("web-1", &[Some(1.0)])]);
        let mut checker = AlertChecker::new("CPU", vec![MetricTarget::new("cpu")]);

        checker.check(&metrics).await.unwrap();
        checker.check(&metrics).await.unwrap();
        assert_eq!(checker.fetched_series().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let metrics = FakeMetrics::default().failing("cpu");
        let mut checker = AlertChecker::new("CPU", vec![MetricTarget::new("cpu")]);

        let result = checker.check(&metrics).await;
        assert!(matches!(result, Err(CheckError::Fetch(FetchError::Network(_)))));
        assert!(!checker.has_checked());
    }
}
