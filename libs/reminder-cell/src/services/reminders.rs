use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{CreateReminderRequest, Reminder, ReminderError};

/// Owner-scoped reminder CRUD. The scheduler is the only other writer.
pub struct ReminderService {
    supabase: Arc<SupabaseClient>,
    clock: Arc<dyn Clock>,
}

impl ReminderService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_parts(supabase: Arc<SupabaseClient>, clock: Arc<dyn Clock>) -> Self {
        Self { supabase, clock }
    }

    pub async fn create_reminder(
        &self,
        owner_id: Uuid,
        request: CreateReminderRequest,
        auth_token: &str,
    ) -> Result<Reminder, ReminderError> {
        if request.medication.trim().is_empty() {
            return Err(ReminderError::ValidationError(
                "Medication name is required".to_string(),
            ));
        }

        debug!(
            "Creating {} reminder for {} due {}",
            request.frequency, owner_id, request.due_at
        );

        let now = self.clock.now();
        let reminder_data = json!({
            "id": Uuid::new_v4(),
            "owner_id": owner_id,
            "medication": request.medication.trim(),
            "due_at": request.due_at.to_rfc3339(),
            "notes": request.notes,
            "frequency": request.frequency,
            "delivered": false,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_representation(
                Method::POST,
                "/rest/v1/medication_reminders",
                Some(auth_token),
                Some(reminder_data),
            )
            .await
            .map_err(|e| ReminderError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or_else(|| {
            ReminderError::DatabaseError("reminder insert returned no row".to_string())
        })?;

        serde_json::from_value(row)
            .map_err(|e| ReminderError::DatabaseError(format!("failed to parse reminder: {}", e)))
    }

    pub async fn list_for_owner(
        &self,
        owner_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Reminder>, ReminderError> {
        let path = format!(
            "/rest/v1/medication_reminders?owner_id=eq.{}&order=due_at.asc",
            owner_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ReminderError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Reminder>, _>>()
            .map_err(|e| ReminderError::DatabaseError(format!("failed to parse reminders: {}", e)))
    }

    /// Delete one of the owner's reminders. The owner filter rides on the
    /// DELETE, so someone else's reminder id matches nothing.
    pub async fn delete_reminder(
        &self,
        reminder_id: Uuid,
        owner_id: Uuid,
        auth_token: &str,
    ) -> Result<(), ReminderError> {
        let path = format!(
            "/rest/v1/medication_reminders?id=eq.{}&owner_id=eq.{}",
            reminder_id, owner_id
        );

        let deleted: Vec<Value> = self
            .supabase
            .request_with_representation(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| ReminderError::DatabaseError(e.to_string()))?;

        if deleted.is_empty() {
            return Err(ReminderError::NotOwner);
        }

        Ok(())
    }
}
