pub mod dashboard;
pub mod series;

pub use dashboard::{
    parse_dashboard, Dashboard, DashboardSummary, MetricTarget, Panel, PanelType, Row,
    UnmonitorableDashboard,
};
pub use series::{DataPoint, MetricSeries};
