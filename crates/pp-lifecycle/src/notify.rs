use anyhow::{anyhow, Context, Result};
use serde_json::json;
use std::time::Duration;
use tracing::info;

use crate::dispatcher::{NotificationRequest, Notifier};

/// Writes the notification to the log instead of delivering it. Used when no
/// webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, req: &NotificationRequest) -> Result<()> {
        info!(
            order_id = %req.order_id,
            notification_type = req.kind.as_str(),
            status = %req.status,
            custom_message = req.message.is_some(),
            "notification (log only)"
        );
        Ok(())
    }
}

/// A hung relay must not hold the order lock indefinitely.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs notifications as JSON to a relay endpoint that owns email delivery.
///
/// The URL comes from an env var named in config; do not log it.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }

    /// `Ok(None)` when the variable is unset or empty.
    pub fn from_env(var_name: &str) -> Result<Option<Self>> {
        match std::env::var(var_name) {
            Ok(v) if !v.trim().is_empty() => Ok(Some(Self::new(v.trim().to_string()))),
            Ok(_) | Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(anyhow!("{var_name} is not valid unicode: {e}")),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, req: &NotificationRequest) -> Result<()> {
        let body = json!({
            "order_id": req.order_id,
            "notification_type": req.kind.as_str(),
            "status": req.status.as_str(),
            "custom_message": req.message,
        });

        let resp = self
            .http
            .post(&self.url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(&body)
            .send()
            .await
            .context("notification webhook request failed")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!(
                "notification webhook http error status={}",
                status.as_u16()
            ));
        }
        Ok(())
    }
}
