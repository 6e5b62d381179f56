//! Alert rules authored as text on a dashboard
//!
//! One rule per line, fields separated by `;`:
//!
//! ```text
//! interval; severity; dest1@example.com, dest2@example.com; short description; long description
//! ```
//!
//! Lines that do not split into at least two fields (blank lines, notes) are
//! ignored.

use std::collections::BTreeSet;

use super::condition::{ConditionError, IntervalCondition};

/// A single parsed rule line
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRule {
    pub condition: IntervalCondition,
    /// Condition text as the author wrote it
    pub condition_text: String,
    pub severity: String,
    pub destinations: BTreeSet<String>,
    pub short_description: String,
    pub long_description: String,
}

impl AlertRule {
    /// Build a rule from already split, trimmed fields
    pub fn from_fields(fields: &[String]) -> Result<Self, ConditionError> {
        let field = |i: usize| fields.get(i).cloned().unwrap_or_default();
        let condition_text = field(0);
        let condition = IntervalCondition::parse(&condition_text)?;

        Ok(Self {
            condition,
            condition_text,
            severity: field(1),
            destinations: parse_destinations(&field(2)),
            short_description: field(3),
            long_description: field(4),
        })
    }
}

/// Outcome of one rule against one value
#[derive(Debug, Clone, Copy)]
pub struct RuleMatch<'a> {
    pub rule: &'a AlertRule,
    pub triggered: bool,
}

/// Ordered rules scoped to a dashboard row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertRuleSet {
    rules: Vec<AlertRule>,
}

impl AlertRuleSet {
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self { rules }
    }

    /// Parse a block of rule text. Any malformed condition fails the whole set.
    pub fn parse(text: &str) -> Result<Self, ConditionError> {
        Self::from_lines(&split_rule_lines(text))
    }

    /// Compile lines previously produced by [`split_rule_lines`]
    pub fn from_lines(lines: &[Vec<String>]) -> Result<Self, ConditionError> {
        let rules = lines
            .iter()
            .map(|fields| AlertRule::from_fields(fields))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Evaluate every rule independently, in authored order.
    ///
    /// Overlapping intervals may trigger several rules for the same value;
    /// all of them are reported.
    pub fn evaluate(&self, x: f64) -> Vec<RuleMatch<'_>> {
        self.rules
            .iter()
            .map(|rule| RuleMatch {
                rule,
                triggered: rule.condition.matches(x),
            })
            .collect()
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Split rule text into per-line trimmed fields, keeping only lines with more
/// than one field. Conditions are not parsed here.
pub fn split_rule_lines(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .map(|line| {
            line.split(';')
                .map(|field| field.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|fields| fields.len() > 1)
        .collect()
}

fn parse_destinations(field: &str) -> BTreeSet<String> {
    field
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from)
        .collect()
}
