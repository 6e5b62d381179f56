//! Grafana Alerts
//!
//! Runs one alerting pass and exits; schedule it from cron or a systemd timer.
//!
//! Environment variables:
//! - GRAFANA_ALERTS_CONFIG: Config file (default: /etc/grafana_alerts/grafana_alerts.toml)
//! - GRAFANA_ALERTS_URL / GRAFANA_ALERTS_TOKEN: Override Grafana URL and token
//! - SMTP_USERNAME / SMTP_PASSWORD: SMTP credentials
//! - RUST_LOG: Log filter (default: configured logging.level)

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use grafana_alerts::alerts::{AlertCheckerCoordinator, DashboardRuleCompiler, Notifier};
use grafana_alerts::{Config, GrafanaClient};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    // Initialize logging
    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with(file_layer)
        .with(stderr_layer)
        .init();

    tracing::info!("================================================");
    tracing::info!("Execution started at {}", chrono::Local::now().format("%c"));
    tracing::debug!("Logging level set to {}", config.logging.level);
    tracing::info!("  Grafana: {}", config.grafana.url);
    tracing::info!("  Monitoring tag: {}", config.grafana.monitoring_tag);
    tracing::info!("  Fetch concurrency: {}", config.fetch_concurrency);

    let client = Arc::new(GrafanaClient::new(&config.grafana)?);
    let notifier = Arc::new(Notifier::from_config(&config.smtp)?);

    let coordinator = AlertCheckerCoordinator::new(client.clone(), client, notifier)
        .with_compiler(DashboardRuleCompiler::new(config.grafana.fetch_window()))
        .with_fetch_concurrency(config.fetch_concurrency);

    let summary = coordinator.run().await?;

    tracing::info!(
        dashboards = summary.dashboards_seen,
        skipped = summary.dashboards_skipped,
        failed_checkers = summary.checkers_failed,
        results = summary.results_reported,
        "Execution finished"
    );

    Ok(())
}
