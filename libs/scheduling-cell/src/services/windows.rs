use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{
    validate_window_bounds, AvailabilityWindow, CreateWindowRequest, SchedulingError, WindowStatus,
};

/// Creation, listing and removal of provider availability windows.
pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_parts(supabase: Arc<SupabaseClient>, clock: Arc<dyn Clock>) -> Self {
        Self { supabase, clock }
    }

    /// Publish a new window for `provider_id`. The window must be well-formed
    /// and must not intersect any existing window of the same provider; the
    /// overlap test is half-open, so back-to-back windows are fine.
    pub async fn propose_window(
        &self,
        provider_id: Uuid,
        request: CreateWindowRequest,
        auth_token: &str,
    ) -> Result<AvailabilityWindow, SchedulingError> {
        debug!(
            "Proposing window for provider {} from {} to {}",
            provider_id, request.start_time, request.end_time
        );

        validate_window_bounds(request.start_time, request.end_time)?;

        let overlapping = self
            .find_overlapping(provider_id, request.start_time, request.end_time, auth_token)
            .await?;
        if !overlapping.is_empty() {
            warn!(
                "Window proposal for provider {} overlaps {} existing window(s)",
                provider_id,
                overlapping.len()
            );
            return Err(SchedulingError::OverlapConflict);
        }

        let now = self.clock.now();
        let window_data = json!({
            "id": Uuid::new_v4(),
            "provider_id": provider_id,
            "start_time": request.start_time.to_rfc3339(),
            "end_time": request.end_time.to_rfc3339(),
            "status": WindowStatus::Free,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_representation(
                Method::POST,
                "/rest/v1/availability_windows",
                Some(auth_token),
                Some(window_data),
            )
            .await
            .map_err(|e| match e {
                // The table's interval exclusion constraint backstops the
                // precheck when two proposals race.
                DbError::Conflict(_) => SchedulingError::OverlapConflict,
                other => SchedulingError::DatabaseError(other.to_string()),
            })?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::DatabaseError("window insert returned no row".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| SchedulingError::DatabaseError(format!("failed to parse window: {}", e)))
    }

    /// All windows owned by a provider, earliest first.
    pub async fn list_windows(
        &self,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        let path = format!(
            "/rest/v1/availability_windows?provider_id=eq.{}&order=start_time.asc",
            provider_id
        );
        self.fetch_windows(&path, auth_token).await
    }

    /// Free windows of a provider starting after the current instant — the
    /// set a patient may claim.
    pub async fn list_bookable_windows(
        &self,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        let now = self.clock.now().to_rfc3339();
        let path = format!(
            "/rest/v1/availability_windows?provider_id=eq.{}&status=eq.free&start_time=gt.{}&order=start_time.asc",
            provider_id,
            urlencoding::encode(&now)
        );
        self.fetch_windows(&path, auth_token).await
    }

    /// Remove a free window owned by `provider_id`. The DELETE carries the
    /// owner and status filters, so a claimed window (or someone else's) is
    /// never touched; the empty result is classified afterwards.
    pub async fn delete_window(
        &self,
        window_id: Uuid,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        debug!("Deleting window {} for provider {}", window_id, provider_id);

        let path = format!(
            "/rest/v1/availability_windows?id=eq.{}&provider_id=eq.{}&status=eq.{}",
            window_id,
            provider_id,
            WindowStatus::Free
        );

        let deleted: Vec<Value> = self
            .supabase
            .request_with_representation(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        if !deleted.is_empty() {
            return Ok(());
        }

        // Nothing matched: claimed, not ours, or gone. Only the owner learns
        // which.
        match self.get_window(window_id, auth_token).await? {
            Some(window) if window.provider_id == provider_id => {
                Err(SchedulingError::WindowNotFree)
            }
            _ => Err(SchedulingError::NotOwner),
        }
    }

    pub async fn get_window(
        &self,
        window_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<AvailabilityWindow>, SchedulingError> {
        let path = format!("/rest/v1/availability_windows?id=eq.{}", window_id);
        let mut windows = self.fetch_windows(&path, auth_token).await?;
        Ok(if windows.is_empty() {
            None
        } else {
            Some(windows.remove(0))
        })
    }

    async fn find_overlapping(
        &self,
        provider_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        // existing.start < end AND existing.end > start
        let path = format!(
            "/rest/v1/availability_windows?provider_id=eq.{}&start_time=lt.{}&end_time=gt.{}",
            provider_id,
            urlencoding::encode(&end.to_rfc3339()),
            urlencoding::encode(&start.to_rfc3339())
        );
        self.fetch_windows(&path, auth_token).await
    }

    async fn fetch_windows(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AvailabilityWindow>, _>>()
            .map_err(|e| SchedulingError::DatabaseError(format!("failed to parse windows: {}", e)))
    }
}
