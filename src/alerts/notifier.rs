//! Notification handlers for alert evaluation results

use std::collections::BTreeMap;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::result::{AlertEvaluationResult, RuleOutcome};
use crate::config::SmtpConfig;

/// Receives the evaluation results of one dashboard
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn report(&self, results: &[AlertEvaluationResult]) -> Result<(), NotifierError>;

    /// Human-readable channel name
    fn channel_name(&self) -> &str;
}

/// Fan-out over every configured channel
pub struct Notifier {
    channels: Vec<Box<dyn AlertSink>>,
}

impl Notifier {
    /// Notifier that only logs
    pub fn new() -> Self {
        Self {
            channels: vec![Box::new(LogSink)],
        }
    }

    /// Log channel plus email when enabled
    pub fn from_config(smtp: &SmtpConfig) -> Result<Self, NotifierError> {
        let mut notifier = Self::new();
        if smtp.enabled {
            notifier = notifier.with_channel(Box::new(MailNotifier::from_config(smtp)?));
        }
        Ok(notifier)
    }

    pub fn with_channel(mut self, channel: Box<dyn AlertSink>) -> Self {
        self.channels.push(channel);
        self
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertSink for Notifier {
    async fn report(&self, results: &[AlertEvaluationResult]) -> Result<(), NotifierError> {
        let mut errors = Vec::new();

        for channel in &self.channels {
            if let Err(e) = channel.report(results).await {
                tracing::error!(channel = channel.channel_name(), error = %e, "Failed to send notification");
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(NotifierError::Multiple(errors))
        }
    }

    fn channel_name(&self) -> &str {
        "notifier"
    }
}

/// Logs every triggered rule through tracing
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn report(&self, results: &[AlertEvaluationResult]) -> Result<(), NotifierError> {
        for result in results {
            for outcome in result.triggered() {
                tracing::warn!(
                    panel = %result.panel_title,
                    target = %result.target_label,
                    severity = %outcome.rule_name,
                    value = result.current_value,
                    "Alert condition {} matched",
                    outcome.condition_text
                );
            }
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}

/// A triggered rule as seen by one destination
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredAlert<'a> {
    pub result: &'a AlertEvaluationResult,
    pub outcome: &'a RuleOutcome,
}

/// destination -> severity -> triggered alerts, in report order
pub type DestinationDigest<'a> = BTreeMap<String, BTreeMap<String, Vec<TriggeredAlert<'a>>>>;

/// Group triggered outcomes by destination, then by severity
pub fn group_by_destination(results: &[AlertEvaluationResult]) -> DestinationDigest<'_> {
    let mut digest: DestinationDigest<'_> = BTreeMap::new();

    for result in results {
        for outcome in result.triggered() {
            for destination in &outcome.destinations {
                digest
                    .entry(destination.clone())
                    .or_default()
                    .entry(outcome.rule_name.clone())
                    .or_default()
                    .push(TriggeredAlert { result, outcome });
            }
        }
    }

    digest
}

/// Render the subject and plain-text body sent to one destination
pub fn render_digest(by_severity: &BTreeMap<String, Vec<TriggeredAlert<'_>>>) -> (String, String) {
    let severities: Vec<&str> = by_severity.keys().map(String::as_str).collect();
    let subject = format!("[grafana-alerts] {}", severities.join(", "));

    let mut body = String::new();
    for (severity, alerts) in by_severity {
        body.push_str(&format!("== {} ==\n", severity));
        for alert in alerts {
            body.push_str(&format!(
                "{} / {}: current value {} matches {}\n",
                alert.result.panel_title,
                alert.result.target_label,
                alert.result.current_value,
                alert.outcome.condition_text
            ));
            if !alert.outcome.short_description.is_empty() {
                body.push_str(&format!("  {}\n", alert.outcome.short_description));
            }
            if !alert.outcome.long_description.is_empty() {
                body.push_str(&format!("  {}\n", alert.outcome.long_description));
            }
        }
        body.push('\n');
    }

    (subject, body)
}

/// Sends one digest email per destination via SMTP
pub struct MailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl MailNotifier {
    pub fn from_config(smtp: &SmtpConfig) -> Result<Self, NotifierError> {
        let from: Mailbox = smtp
            .email_from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifierError::Config(e.to_string()))?;

        let builder = if smtp.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.server)
                .map_err(|e| NotifierError::Config(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.server)
        };
        let mut builder = builder.port(smtp.port);

        if let (Some(username), Some(password)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    async fn send(&self, to: &str, subject: String, body: String) -> Result<(), NotifierError> {
        let to: Mailbox = to
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifierError::Email(format!("{}: {}", to, e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(body)
            .map_err(|e| NotifierError::Email(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifierError::Email(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl AlertSink for MailNotifier {
    async fn report(&self, results: &[AlertEvaluationResult]) -> Result<(), NotifierError> {
        let mut errors = Vec::new();

        for (destination, by_severity) in group_by_destination(results) {
            let (subject, body) = render_digest(&by_severity);
            match self.send(&destination, subject, body).await {
                Ok(()) => tracing::debug!(destination = %destination, "Email notification sent"),
                Err(e) => errors.push(e),
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(NotifierError::Multiple(errors)),
        }
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}

/// Notifier errors
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Email error: {0}")]
    Email(String),

    #[error("Notifier configuration error: {0}")]
    Config(String),

    #[error("Multiple notification failures: {0:?}")]
    Multiple(Vec<NotifierError>),
}
