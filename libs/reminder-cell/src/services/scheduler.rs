use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{Reminder, ReminderError};
use crate::services::notifier::{ReminderNotifier, WebhookNotifier};

/// Background engine that fires due reminders. One task, fixed poll period;
/// a tick that runs past the next deadline causes the missed tick to be
/// skipped, never queued, so two scans can never run over the same records.
pub struct ReminderSchedulerService {
    supabase: Arc<SupabaseClient>,
    notifier: Arc<dyn ReminderNotifier>,
    clock: Arc<dyn Clock>,
    poll_interval: std::time::Duration,
    is_shutdown: tokio::sync::RwLock<bool>,
}

impl ReminderSchedulerService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            notifier: Arc::new(WebhookNotifier::new(config)),
            clock: Arc::new(SystemClock),
            poll_interval: std::time::Duration::from_secs(config.reminder_poll_seconds),
            is_shutdown: tokio::sync::RwLock::new(false),
        }
    }

    pub fn with_parts(
        supabase: Arc<SupabaseClient>,
        notifier: Arc<dyn ReminderNotifier>,
        clock: Arc<dyn Clock>,
        poll_interval: std::time::Duration,
    ) -> Self {
        Self {
            supabase,
            notifier,
            clock,
            poll_interval,
            is_shutdown: tokio::sync::RwLock::new(false),
        }
    }

    /// Spawn the polling loop. Returns the task handle; use `shutdown` to
    /// stop the loop at the next tick boundary.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop().await;
        })
    }

    pub async fn shutdown(&self) {
        info!("Reminder scheduler shutting down");
        let mut is_shutdown = self.is_shutdown.write().await;
        *is_shutdown = true;
    }

    async fn run_loop(&self) {
        info!(
            "Reminder scheduler started, polling every {:?}",
            self.poll_interval
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            if *self.is_shutdown.read().await {
                break;
            }

            let now = self.clock.now();
            match self.run_tick(now).await {
                Ok(0) => {}
                Ok(count) => debug!("Processed {} due reminder(s)", count),
                // A failed scan only costs this tick
                Err(e) => error!("Reminder scan failed: {}", e),
            }
        }

        debug!("Reminder scheduler loop ended");
    }

    /// One scan pass: find everything due at `now`, deliver, then persist the
    /// state change. Each reminder is handled independently — one bad record
    /// or failed delivery never blocks the rest of the batch.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<usize, ReminderError> {
        let due = self.scan_due(now).await?;
        let mut processed = 0;

        for reminder in due {
            match self
                .notifier
                .deliver(
                    reminder.owner_id,
                    &reminder.medication,
                    reminder.notes.as_deref(),
                )
                .await
            {
                Ok(()) => {}
                Err(e) => {
                    // Left due; the next tick retries (at-least-once).
                    warn!("Delivery failed for reminder {}: {}", reminder.id, e);
                    continue;
                }
            }

            let result = match reminder.frequency.period() {
                None => self.mark_delivered(&reminder).await,
                Some(period) => self.advance_due(&reminder, reminder.due_at + period).await,
            };

            match result {
                Ok(()) => processed += 1,
                Err(e) => {
                    error!(
                        "Failed to persist update for reminder {}: {}",
                        reminder.id, e
                    );
                }
            }
        }

        Ok(processed)
    }

    async fn scan_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, ReminderError> {
        let path = format!(
            "/rest/v1/medication_reminders?delivered=eq.false&due_at=lte.{}&order=due_at.asc",
            urlencoding::encode(&now.to_rfc3339())
        );

        // Runs with the service key; there is no user in this context.
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| ReminderError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Reminder>, _>>()
            .map_err(|e| ReminderError::DatabaseError(format!("failed to parse reminders: {}", e)))
    }

    /// One-shot fired: flag it, guarded on the flag still being clear so a
    /// competing pass cannot deliver-and-flag twice.
    async fn mark_delivered(&self, reminder: &Reminder) -> Result<(), ReminderError> {
        let path = format!(
            "/rest/v1/medication_reminders?id=eq.{}&delivered=eq.false",
            reminder.id
        );
        let updated: Vec<Value> = self
            .supabase
            .request_with_representation(
                Method::PATCH,
                &path,
                None,
                Some(json!({
                    "delivered": true,
                    "updated_at": self.clock.now().to_rfc3339()
                })),
            )
            .await
            .map_err(|e| ReminderError::DatabaseError(e.to_string()))?;

        if updated.is_empty() {
            debug!("Reminder {} was already flagged delivered", reminder.id);
        }
        Ok(())
    }

    /// Recurring reminder fired: advance the due instant by its period,
    /// guarded on the old due value. If another pass advanced it first, this
    /// matches nothing and the due event is still counted exactly once.
    async fn advance_due(
        &self,
        reminder: &Reminder,
        new_due: DateTime<Utc>,
    ) -> Result<(), ReminderError> {
        let path = format!(
            "/rest/v1/medication_reminders?id=eq.{}&due_at=eq.{}",
            reminder.id,
            urlencoding::encode(&reminder.due_at.to_rfc3339())
        );
        let updated: Vec<Value> = self
            .supabase
            .request_with_representation(
                Method::PATCH,
                &path,
                None,
                Some(json!({
                    "due_at": new_due.to_rfc3339(),
                    "updated_at": self.clock.now().to_rfc3339()
                })),
            )
            .await
            .map_err(|e| ReminderError::DatabaseError(e.to_string()))?;

        if updated.is_empty() {
            debug!("Reminder {} due instant already advanced", reminder.id);
        }
        Ok(())
    }
}
