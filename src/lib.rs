//! Grafana Alerts: threshold alerting from dashboard annotations
//!
//! Polls a Grafana instance for dashboards tagged `monitored`, reads alert
//! rules written in text panels titled `alerts`, evaluates the current value
//! of every metric panel in the same row against those rules and reports
//! the outcome.
//!
//! # Rule syntax
//!
//! One rule per line, fields separated by `;`:
//!
//! ```text
//! x<=0;       critical; ops@example.com;                 Service down
//! 0<x<50;     warning;  ops@example.com, dev@example.com; Low throughput
//! 50<=x;      normal;   ops@example.com
//! ```
//!
//! The current value `x` is the mean of the non-null samples of the last
//! 60 seconds. Every rule is evaluated on its own, so overlapping intervals
//! report every matching severity.
//!
//! # Example
//!
//! ```no_run
//! use grafana_alerts::rules::AlertRuleSet;
//!
//! let rules = AlertRuleSet::parse("x<50; normal; a@b.com\n50<=x; critical; a@b.com").unwrap();
//! let triggered: Vec<_> = rules
//!     .evaluate(72.0)
//!     .into_iter()
//!     .filter(|m| m.triggered)
//!     .map(|m| m.rule.severity.as_str())
//!     .collect();
//! assert_eq!(triggered, vec!["critical"]);
//! ```

pub mod alerts;
pub mod config;
pub mod data;
pub mod grafana;
pub mod rules;

// Re-export commonly used types
pub use alerts::{AlertChecker, AlertCheckerCoordinator, AlertEvaluationResult, RunSummary};
pub use config::{Config, ConfigError};
pub use grafana::{DashboardSource, FetchError, GrafanaClient, MetricSource};
pub use rules::{AlertRuleSet, ConditionError, IntervalCondition};
