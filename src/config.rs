//! Runtime configuration
//!
//! Loaded from a TOML file, then overridden from the environment:
//!
//! - GRAFANA_ALERTS_CONFIG: config file path (default: /etc/grafana_alerts/grafana_alerts.toml)
//! - GRAFANA_ALERTS_URL: Grafana base URL
//! - GRAFANA_ALERTS_TOKEN: Grafana API bearer token
//! - SMTP_USERNAME / SMTP_PASSWORD: SMTP credentials
//!
//! Example file:
//!
//! ```toml
//! fetch_concurrency = 1
//!
//! [grafana]
//! url = "http://localhost:3130/"
//! token = "eyJrIjoi..."
//!
//! [smtp]
//! server = "localhost"
//! port = 25
//! email_from = "grafana-alert@localhost"
//!
//! [logging]
//! file = "/var/log/grafana_alerts.log"
//! level = "warn"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::grafana::FetchWindow;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/grafana_alerts/grafana_alerts.toml";
pub const CONFIG_PATH_ENV: &str = "GRAFANA_ALERTS_CONFIG";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grafana: GrafanaConfig,
    pub smtp: SmtpConfig,
    pub logging: LoggingConfig,
    /// Number of checkers fetched at once within a dashboard (1 = sequential)
    pub fetch_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grafana: GrafanaConfig::default(),
            smtp: SmtpConfig::default(),
            logging: LoggingConfig::default(),
            fetch_concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrafanaConfig {
    /// Base URL, normalized to end with '/'
    pub url: String,
    /// Bearer token, empty for anonymous access
    pub token: String,
    /// Tag marking dashboards to monitor
    pub monitoring_tag: String,
    pub search_limit: u32,
    /// Datasource proxied for metric renders
    pub datasource_id: u32,
    pub timeout_secs: u64,
    pub window_from: String,
    pub max_data_points: u32,
}

impl Default for GrafanaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3130/".to_string(),
            token: String::new(),
            monitoring_tag: "monitored".to_string(),
            search_limit: 10,
            datasource_id: 1,
            timeout_secs: 30,
            window_from: "-60s".to_string(),
            max_data_points: 100,
        }
    }
}

impl GrafanaConfig {
    pub fn fetch_window(&self) -> FetchWindow {
        FetchWindow {
            from: self.window_from.clone(),
            max_data_points: self.max_data_points,
            ..FetchWindow::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// Send email digests; when false only the log channel is used
    pub enabled: bool,
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub email_from: String,
    pub tls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server: "localhost".to_string(),
            port: 25,
            username: None,
            password: None,
            email_from: "grafana-alert@localhost".to_string(),
            tls: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log file, stderr when unset
    pub file: Option<PathBuf>,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: None,
            level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load from the path in GRAFANA_ALERTS_CONFIG, or the default path.
    ///
    /// A missing file at the default path yields the defaults; a missing file
    /// that was asked for explicitly is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(DEFAULT_CONFIG_PATH)?
            }
            Err(_) => Self::default(),
        };
        config.with_env_overrides().validated()
    }

    /// Parse a config file without applying environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("GRAFANA_ALERTS_URL") {
            self.grafana.url = url;
        }
        if let Ok(token) = std::env::var("GRAFANA_ALERTS_TOKEN") {
            self.grafana.token = token;
        }
        if let Ok(username) = std::env::var("SMTP_USERNAME") {
            self.smtp.username = Some(username);
        }
        if let Ok(password) = std::env::var("SMTP_PASSWORD") {
            self.smtp.password = Some(password);
        }
        self
    }

    /// Check every option and normalize the Grafana URL
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        let url = self.grafana.url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid("grafana.url must not be empty".to_string()));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "grafana.url must be an http(s) URL, got '{}'",
                url
            )));
        }
        self.grafana.url = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{}/", url)
        };

        self.logging.level = self.logging.level.trim().to_lowercase();
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of {:?}, got '{}'",
                LOG_LEVELS, self.logging.level
            )));
        }

        if self.fetch_concurrency == 0 {
            return Err(ConfigError::Invalid("fetch_concurrency must be at least 1".to_string()));
        }
        if self.grafana.max_data_points == 0 {
            return Err(ConfigError::Invalid(
                "grafana.max_data_points must be at least 1".to_string(),
            ));
        }
        if self.smtp.enabled && !self.smtp.email_from.contains('@') {
            return Err(ConfigError::Invalid(format!(
                "smtp.email_from is not an email address: '{}'",
                self.smtp.email_from
            )));
        }

        Ok(self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Error reading configuration {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
