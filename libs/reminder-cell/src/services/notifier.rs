use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::ReminderError;

/// Delivery side effect for a due reminder. Opaque to the scheduler: it may
/// fail, and the scheduler only cares whether it did.
#[async_trait]
pub trait ReminderNotifier: Send + Sync {
    async fn deliver(
        &self,
        owner_id: Uuid,
        medication: &str,
        notes: Option<&str>,
    ) -> Result<(), ReminderError>;
}

/// Posts due reminders to the configured webhook. With no webhook configured
/// it degrades to a log line, which keeps local setups running.
pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: config.notification_webhook_url.clone(),
        }
    }
}

#[async_trait]
impl ReminderNotifier for WebhookNotifier {
    async fn deliver(
        &self,
        owner_id: Uuid,
        medication: &str,
        notes: Option<&str>,
    ) -> Result<(), ReminderError> {
        if self.webhook_url.is_empty() {
            info!("Reminder due for {}: {}", owner_id, medication);
            return Ok(());
        }

        debug!("Delivering reminder for {} to webhook", owner_id);

        let payload = json!({
            "owner_id": owner_id,
            "medication": medication,
            "notes": notes,
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ReminderError::DeliveryError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReminderError::DeliveryError(format!(
                "webhook returned {}",
                status
            )));
        }

        Ok(())
    }
}
