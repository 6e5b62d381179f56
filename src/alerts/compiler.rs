//! Turns a dashboard's rows of panels into alert checkers
//!
//! Each row is handled in two phases: first its metric panels become
//! checkers and the lines of any text panel titled `alerts` are collected,
//! then the collected lines are compiled once and the resulting rule set is
//! shared by every checker of that row.

use std::sync::Arc;

use super::checker::AlertChecker;
use crate::data::{Dashboard, PanelType, Row};
use crate::grafana::FetchWindow;
use crate::rules::{split_rule_lines, AlertRuleSet, ConditionError};

/// Title of the text panel holding a row's rule definitions
pub const ALERTS_PANEL_TITLE: &str = "alerts";

#[derive(Debug, Clone, Default)]
pub struct DashboardRuleCompiler {
    window: FetchWindow,
}

impl DashboardRuleCompiler {
    pub fn new(window: FetchWindow) -> Self {
        Self { window }
    }

    /// Build checkers for every metric panel, in row then panel order
    pub fn compile(&self, dashboard: &Dashboard) -> Result<Vec<AlertChecker>, CompileError> {
        let mut checkers = Vec::new();

        for (index, row) in dashboard.rows.iter().enumerate() {
            let row_checkers =
                self.compile_row(&dashboard.title, row)
                    .map_err(|source| CompileError {
                        dashboard: dashboard.title.clone(),
                        row: index,
                        source,
                    })?;
            checkers.extend(row_checkers);
        }

        Ok(checkers)
    }

    fn compile_row(&self, dashboard: &str, row: &Row) -> Result<Vec<AlertChecker>, ConditionError> {
        let mut checkers = Vec::new();
        let mut rule_lines = Vec::new();

        for panel in &row.panels {
            tracing::info!(
                dashboard = %dashboard,
                panel = %panel.title,
                "Checking panel of type {}",
                panel.kind
            );

            match panel.panel_type() {
                PanelType::Graph | PanelType::SingleStat => {
                    checkers.push(
                        AlertChecker::new(panel.title.clone(), panel.targets.clone())
                            .with_window(self.window.clone()),
                    );
                }
                PanelType::Text if panel.title == ALERTS_PANEL_TITLE => {
                    rule_lines.extend(split_rule_lines(&panel.content));
                }
                PanelType::Text => {}
                PanelType::Other => {
                    tracing::warn!(
                        dashboard = %dashboard,
                        panel = %panel.title,
                        "Unknown panel type {}. Ignoring.",
                        panel.kind
                    );
                }
            }
        }

        if !rule_lines.is_empty() {
            let rule_set = Arc::new(AlertRuleSet::from_lines(&rule_lines)?);
            for checker in &mut checkers {
                checker.set_rule_set(Arc::clone(&rule_set));
            }
        }

        Ok(checkers)
    }
}

/// A rule line in one of the dashboard's rows did not parse
#[derive(Debug, thiserror::Error)]
#[error("Invalid alert rules in row {row} of dashboard {dashboard}: {source}")]
pub struct CompileError {
    pub dashboard: String,
    pub row: usize,
    #[source]
    pub source: ConditionError,
}
