//! Alert checking for dashboard-embedded threshold rules
//!
//! Dashboards are compiled into per-panel checkers, each checker fetches its
//! recent metric window, reduces every series to one value and evaluates the
//! row's rules against it. Results go to notification sinks.

pub mod aggregate;
pub mod checker;
pub mod compiler;
pub mod coordinator;
pub mod notifier;
pub mod result;

pub use aggregate::current_value;
pub use checker::{AlertChecker, CheckError};
pub use compiler::{CompileError, DashboardRuleCompiler, ALERTS_PANEL_TITLE};
pub use coordinator::{AlertCheckerCoordinator, CoordinatorError, DashboardError, RunSummary};
pub use notifier::{AlertSink, LogSink, MailNotifier, Notifier, NotifierError};
pub use result::{AlertEvaluationResult, RuleOutcome};
