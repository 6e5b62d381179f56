//! Rule language for dashboard-embedded alert definitions

pub mod condition;
pub mod rule_set;

pub use condition::{ConditionError, IntervalCondition};
pub use rule_set::{split_rule_lines, AlertRule, AlertRuleSet, RuleMatch};
