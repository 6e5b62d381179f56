//! Dashboard listing and detail types
//!
//! Mirrors the subset of the Grafana dashboard JSON the alert engine reads:
//! `dashboard.rows[*].panels[*]` with each panel's title, type, targets and
//! (for text panels) content.

use serde::{Deserialize, Serialize};

/// One entry of the monitored-dashboard search listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub title: String,
    /// Legacy search results carry `db/<slug>` here
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DashboardSummary {
    pub fn new(title: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            uri: String::new(),
            slug: Some(slug.into()),
            tags: Vec::new(),
        }
    }

    /// Slug used to address the dashboard detail endpoint
    pub fn slug(&self) -> &str {
        match &self.slug {
            Some(slug) if !slug.is_empty() => slug,
            _ => self.uri.strip_prefix("db/").unwrap_or(&self.uri),
        }
    }
}

/// A dashboard reduced to its rows of panels
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    pub title: String,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub panels: Vec<Panel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Panel {
    #[serde(default)]
    pub title: String,
    /// Raw panel type as sent by Grafana
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub targets: Vec<MetricTarget>,
    #[serde(default)]
    pub content: String,
}

impl Panel {
    pub fn panel_type(&self) -> PanelType {
        PanelType::from(self.kind.as_str())
    }
}

/// Panel types the compiler distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelType {
    Graph,
    SingleStat,
    Text,
    Other,
}

impl From<&str> for PanelType {
    fn from(kind: &str) -> Self {
        match kind {
            "graph" => PanelType::Graph,
            "singlestat" => PanelType::SingleStat,
            "text" => PanelType::Text,
            _ => PanelType::Other,
        }
    }
}

/// A metric query attached to a panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTarget {
    #[serde(rename = "target", default)]
    pub query: String,
    #[serde(rename = "hide", default)]
    pub hidden: bool,
}

impl MetricTarget {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            hidden: false,
        }
    }
}

/// Raised when a dashboard detail payload is not usable structured data
#[derive(Debug, Clone, thiserror::Error)]
#[error("The definition of dashboard {title} does not look like valid json: {reason}")]
pub struct UnmonitorableDashboard {
    pub title: String,
    pub reason: String,
}

#[derive(Deserialize)]
struct DetailEnvelope {
    dashboard: DetailBody,
}

#[derive(Deserialize)]
struct DetailBody {
    #[serde(default)]
    rows: Vec<Row>,
}

/// Parse a dashboard detail response body into rows of panels
pub fn parse_dashboard(title: &str, raw: &str) -> Result<Dashboard, UnmonitorableDashboard> {
    let escaped = escape_raw_newlines(raw);
    let envelope: DetailEnvelope =
        serde_json::from_str(&escaped).map_err(|e| UnmonitorableDashboard {
            title: title.to_string(),
            reason: e.to_string(),
        })?;

    Ok(Dashboard {
        title: title.to_string(),
        rows: envelope.dashboard.rows,
    })
}

/// Escape bare CR/LF characters found inside JSON string literals.
///
/// Text panels edited by hand sometimes come back with literal line breaks in
/// their `content`, which strict JSON rejects. Whitespace between tokens is
/// left untouched.
fn escape_raw_newlines(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in raw.chars() {
        if in_string {
            match c {
                _ if escaped => {
                    escaped = false;
                    out.push(c);
                }
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_from_uri() {
        let summary: DashboardSummary = serde_json::from_str(
            r#"{"slug": "", "tags": [], "isStarred": false, "id": 4, "title": "Prod Storage", "uri": "db/prod-storage"}"#,
        )
        .unwrap();
        assert_eq!(summary.slug(), "prod-storage");

        let summary = DashboardSummary::new("Web", "web-frontends");
        assert_eq!(summary.slug(), "web-frontends");
    }

    #[test]
    fn test_parse_rows_and_panels() {
        let raw = r#"{"dashboard": {"rows": [
            {"panels": [
                {"title": "CPU", "type": "graph", "targets": [{"target": "servers.*.cpu"}, {"target": "hidden.one", "hide": true}]},
                {"title": "alerts", "type": "text", "content": "x<1; normal; a@b.com"}
            ]},
            {"panels": [{"title": "Table", "type": "table"}]}
        ]}}"#;

        let dashboard = parse_dashboard("Servers", raw).unwrap();
        assert_eq!(dashboard.title, "Servers");
        assert_eq!(dashboard.rows.len(), 2);

        let panels = &dashboard.rows[0].panels;
        assert_eq!(panels[0].panel_type(), PanelType::Graph);
        assert_eq!(panels[0].targets.len(), 2);
        assert!(!panels[0].targets[0].hidden);
        assert!(panels[0].targets[1].hidden);
        assert_eq!(panels[1].panel_type(), PanelType::Text);
        assert_eq!(dashboard.rows[1].panels[0].panel_type(), PanelType::Other);
    }

    #[test]
    fn test_raw_newlines_inside_content() {
        let raw = "{\"dashboard\": {\"rows\": [{\"panels\": [{\"title\": \"alerts\", \"type\": \"text\", \"content\": \"x<1; normal; a@b.com\r\n1<=x; critical; a@b.com\"}]}]}}";

        let dashboard = parse_dashboard("Multi-line", raw).unwrap();
        let content = &dashboard.rows[0].panels[0].content;
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_pretty_printed_payload_still_parses() {
        let raw = "{\n  \"dashboard\": {\n    \"rows\": []\n  }\n}\n";
        let dashboard = parse_dashboard("Empty", raw).unwrap();
        assert!(dashboard.rows.is_empty());
    }

    #[test]
    fn test_garbage_is_unmonitorable() {
        let err = parse_dashboard("Broken", "<html>502 Bad Gateway</html>").unwrap_err();
        assert_eq!(err.title, "Broken");
        assert!(err.to_string().contains("Broken"));
    }
}
