//! Discrepancy notifications
//!
//! Delivery is best effort: callers go through [`notify_quietly`], which logs
//! failures instead of returning them.

use crate::config::NotifyConfig;
use crate::error::{ReconError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Plain-text email about one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn compose(from: &str, to: &str, order_id: &str, status: &str, details: &[String]) -> Self {
        let mut body = format!("Order ID: {}\nStatus: {}\n", order_id, status);
        for detail in details {
            body.push_str(detail);
            body.push('\n');
        }
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: format!("Financial Discrepancy Update - Order ID: {}", order_id),
            body,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, order_id: &str, status: &str, details: &[String]) -> Result<()>;
}

/// Send a notification, logging instead of propagating any failure.
pub async fn notify_quietly(notifier: &dyn Notifier, order_id: &str, status: &str, details: &[String]) -> bool {
    match notifier.notify(order_id, status, details).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Notification for {} failed: {}", order_id, e);
            false
        }
    }
}

/// Pick the notifier for the config: a webhook relay when one is set, the log
/// otherwise.
pub fn build_notifier(config: &NotifyConfig) -> Arc<dyn Notifier> {
    match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone(), config.from.clone(), config.to.clone())),
        None => Arc::new(LogNotifier::new(config.from.clone(), config.to.clone())),
    }
}

/// Writes the composed message to the log.
pub struct LogNotifier {
    from: String,
    to: String,
}

impl LogNotifier {
    pub fn new(from: String, to: String) -> Self {
        Self { from, to }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, order_id: &str, status: &str, details: &[String]) -> Result<()> {
        let message = EmailMessage::compose(&self.from, &self.to, order_id, status, details);
        info!(to = %message.to, subject = %message.subject, "{}", message.body.trim_end());
        Ok(())
    }
}

/// POSTs the message as JSON to a mail relay.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    from: String,
    to: String,
}

impl WebhookNotifier {
    pub fn new(url: String, from: String, to: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            from,
            to,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, order_id: &str, status: &str, details: &[String]) -> Result<()> {
        let message = EmailMessage::compose(&self.from, &self.to, order_id, status, details);
        let response = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .map_err(|e| ReconError::Notify(format!("Relay request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ReconError::Notify(format!(
                "Relay rejected message with status {}",
                response.status()
            )));
        }
        info!("Notification sent for {}", order_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_message() {
        let message = EmailMessage::compose(
            "recon@example.com",
            "ops@example.com",
            "T42",
            "Unresolved",
            &["Summary: bank delay".to_string(), "Next: call bank".to_string()],
        );
        assert_eq!(message.subject, "Financial Discrepancy Update - Order ID: T42");
        assert_eq!(
            message.body,
            "Order ID: T42\nStatus: Unresolved\nSummary: bank delay\nNext: call bank\n"
        );
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _order_id: &str, _status: &str, _details: &[String]) -> Result<()> {
            Err(ReconError::Notify("smtp down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        assert!(!notify_quietly(&FailingNotifier, "T1", "Unresolved", &[]).await);
        let log = LogNotifier::new(String::new(), String::new());
        assert!(notify_quietly(&log, "T1", "Unresolved", &[]).await);
    }
}
