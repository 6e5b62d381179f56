//! Evaluation results handed to notification sinks

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::rules::RuleMatch;

/// Outcome of one rule for one series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutcome {
    /// Severity label of the rule
    pub rule_name: String,
    pub condition_text: String,
    pub triggered: bool,
    pub destinations: BTreeSet<String>,
    pub short_description: String,
    pub long_description: String,
}

impl From<RuleMatch<'_>> for RuleOutcome {
    fn from(m: RuleMatch<'_>) -> Self {
        Self {
            rule_name: m.rule.severity.clone(),
            condition_text: m.rule.condition_text.clone(),
            triggered: m.triggered,
            destinations: m.rule.destinations.clone(),
            short_description: m.rule.short_description.clone(),
            long_description: m.rule.long_description.clone(),
        }
    }
}

/// Per-panel, per-series evaluation of a rule set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvaluationResult {
    pub panel_title: String,
    pub target_label: String,
    /// NaN when the series had no samples in the window
    pub current_value: f64,
    pub outcomes: Vec<RuleOutcome>,
    pub evaluated_at: DateTime<Utc>,
}

impl AlertEvaluationResult {
    pub fn triggered(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|o| o.triggered)
    }

    pub fn has_data(&self) -> bool {
        !self.current_value.is_nan()
    }
}
