// libs/scheduling-cell/src/services/allocator.rs
use std::sync::Arc;

use rand::{distributions::Alphanumeric, Rng};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{
    AvailabilityWindow, Booking, BookingStatus, ClaimWindowRequest, SchedulingError, WindowStatus,
};

const SESSION_TOKEN_LEN: usize = 16;

/// The transactional half of scheduling: claiming a window for a booking and
/// walking a booking through its lifecycle. Every mutation here is a filtered
/// conditional write — the store applies it only if the row still matches the
/// expected prior state, so racing callers lose cleanly instead of corrupting
/// the claim.
pub struct BookingAllocator {
    supabase: Arc<SupabaseClient>,
    clock: Arc<dyn Clock>,
}

impl BookingAllocator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_parts(supabase: Arc<SupabaseClient>, clock: Arc<dyn Clock>) -> Self {
        Self { supabase, clock }
    }

    /// Atomically claim a free window for `patient_id`. Exactly one of any
    /// set of concurrent callers wins; the rest see `SlotUnavailable`, as
    /// does anyone holding a stale window reference or a wrong provider id.
    pub async fn claim_window(
        &self,
        patient_id: Uuid,
        request: ClaimWindowRequest,
        auth_token: &str,
    ) -> Result<Booking, SchedulingError> {
        debug!(
            "Patient {} claiming window {} of provider {}",
            patient_id, request.window_id, request.provider_id
        );

        let now = self.clock.now();

        // Flip free -> claimed, guarded on the current state. An empty result
        // means a concurrent winner, a missing window, or a provider
        // mismatch; the caller cannot tell which, deliberately.
        let path = format!(
            "/rest/v1/availability_windows?id=eq.{}&provider_id=eq.{}&status=eq.{}",
            request.window_id,
            request.provider_id,
            WindowStatus::Free
        );
        let claimed: Vec<Value> = self
            .supabase
            .request_with_representation(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({
                    "status": WindowStatus::Claimed,
                    "updated_at": now.to_rfc3339()
                })),
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let window: AvailabilityWindow = match claimed.into_iter().next() {
            Some(row) => serde_json::from_value(row).map_err(|e| {
                SchedulingError::DatabaseError(format!("failed to parse window: {}", e))
            })?,
            None => return Err(SchedulingError::SlotUnavailable),
        };

        let booking_id = Uuid::new_v4();
        let booking_data = json!({
            "id": booking_id,
            "patient_id": patient_id,
            "provider_id": window.provider_id,
            "window_id": window.id,
            "scheduled_at": window.start_time.to_rfc3339(),
            "status": BookingStatus::Pending,
            "session_token": generate_session_token(),
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let inserted: Result<Vec<Value>, _> = self
            .supabase
            .request_with_representation(
                Method::POST,
                "/rest/v1/bookings",
                Some(auth_token),
                Some(booking_data),
            )
            .await;

        let row = match inserted {
            Ok(rows) => rows.into_iter().next(),
            Err(e) => {
                // The window is claimed but the booking never landed; undo
                // the flip before surfacing the failure so the unit stays
                // all-or-nothing.
                self.rollback_claim(window.id, auth_token).await;
                return Err(SchedulingError::DatabaseError(e.to_string()));
            }
        };

        let row = match row {
            Some(row) => row,
            None => {
                self.rollback_claim(window.id, auth_token).await;
                return Err(SchedulingError::DatabaseError(
                    "booking insert returned no row".to_string(),
                ));
            }
        };

        let booking: Booking = serde_json::from_value(row)
            .map_err(|e| SchedulingError::DatabaseError(format!("failed to parse booking: {}", e)))?;

        info!(
            "Window {} claimed by patient {} as booking {}",
            window.id, patient_id, booking.id
        );
        Ok(booking)
    }

    /// Cancel a pending booking and hand its window back. Only the booking's
    /// patient may do this; a booking already done or cancelled is reported,
    /// not retried.
    pub async fn release_booking(
        &self,
        booking_id: Uuid,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Booking, SchedulingError> {
        debug!("Patient {} cancelling booking {}", patient_id, booking_id);

        let now = self.clock.now();
        let path = format!(
            "/rest/v1/bookings?id=eq.{}&patient_id=eq.{}&status=eq.{}",
            booking_id,
            patient_id,
            BookingStatus::Pending
        );
        let cancelled: Vec<Value> = self
            .supabase
            .request_with_representation(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({
                    "status": BookingStatus::Cancelled,
                    "updated_at": now.to_rfc3339()
                })),
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let booking: Booking = match cancelled.into_iter().next() {
            Some(row) => serde_json::from_value(row).map_err(|e| {
                SchedulingError::DatabaseError(format!("failed to parse booking: {}", e))
            })?,
            None => {
                return Err(self
                    .classify_missed_update(booking_id, patient_id, auth_token)
                    .await)
            }
        };

        // Free the window, but only if this booking's claim still holds it.
        let window_path = format!(
            "/rest/v1/availability_windows?id=eq.{}&status=eq.{}",
            booking.window_id,
            WindowStatus::Claimed
        );
        let freed: Vec<Value> = self
            .supabase
            .request_with_representation(
                Method::PATCH,
                &window_path,
                Some(auth_token),
                Some(json!({
                    "status": WindowStatus::Free,
                    "updated_at": now.to_rfc3339()
                })),
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        if freed.is_empty() {
            // Tolerated: the window was already released by another path.
            // Loud enough to spot if it starts happening outside recovery.
            warn!(
                "Booking {} cancelled but window {} was not claimed",
                booking.id, booking.window_id
            );
        }

        info!("Booking {} cancelled by patient {}", booking.id, patient_id);
        Ok(booking)
    }

    /// Provider marks a pending booking complete.
    pub async fn complete_booking(
        &self,
        booking_id: Uuid,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<Booking, SchedulingError> {
        debug!("Provider {} completing booking {}", provider_id, booking_id);

        let now = self.clock.now();
        let path = format!(
            "/rest/v1/bookings?id=eq.{}&provider_id=eq.{}&status=eq.{}",
            booking_id,
            provider_id,
            BookingStatus::Pending
        );
        let updated: Vec<Value> = self
            .supabase
            .request_with_representation(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({
                    "status": BookingStatus::Done,
                    "updated_at": now.to_rfc3339()
                })),
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        match updated.into_iter().next() {
            Some(row) => serde_json::from_value(row).map_err(|e| {
                SchedulingError::DatabaseError(format!("failed to parse booking: {}", e))
            }),
            None => Err(self
                .classify_missed_update(booking_id, provider_id, auth_token)
                .await),
        }
    }

    pub async fn get_booking(
        &self,
        booking_id: Uuid,
        auth_token: &str,
    ) -> Result<Booking, SchedulingError> {
        let path = format!("/rest/v1/bookings?id=eq.{}", booking_id);
        let mut bookings = self.fetch_bookings(&path, auth_token).await?;
        if bookings.is_empty() {
            // Missing and unauthorized look the same from outside.
            return Err(SchedulingError::NotOwner);
        }
        Ok(bookings.remove(0))
    }

    pub async fn list_patient_bookings(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Booking>, SchedulingError> {
        let path = format!(
            "/rest/v1/bookings?patient_id=eq.{}&order=scheduled_at.desc",
            patient_id
        );
        self.fetch_bookings(&path, auth_token).await
    }

    pub async fn list_provider_bookings(
        &self,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Booking>, SchedulingError> {
        let path = format!(
            "/rest/v1/bookings?provider_id=eq.{}&order=scheduled_at.desc",
            provider_id
        );
        self.fetch_bookings(&path, auth_token).await
    }

    /// A conditional pending-state update matched nothing. Work out whether
    /// that was ownership or a terminal status — but only for the actual
    /// owner; everyone else gets `NotOwner` regardless of existence.
    async fn classify_missed_update(
        &self,
        booking_id: Uuid,
        actor_id: Uuid,
        auth_token: &str,
    ) -> SchedulingError {
        let path = format!("/rest/v1/bookings?id=eq.{}", booking_id);
        match self.fetch_bookings(&path, auth_token).await {
            Ok(bookings) => match bookings.into_iter().next() {
                Some(b) if b.patient_id == actor_id || b.provider_id == actor_id => {
                    if b.status.is_terminal() {
                        SchedulingError::AlreadyTerminal(b.status)
                    } else {
                        // Pending again? The precondition should have matched;
                        // treat as contention.
                        SchedulingError::SlotUnavailable
                    }
                }
                _ => SchedulingError::NotOwner,
            },
            Err(e) => e,
        }
    }

    async fn rollback_claim(&self, window_id: Uuid, auth_token: &str) {
        let path = format!(
            "/rest/v1/availability_windows?id=eq.{}&status=eq.{}",
            window_id,
            WindowStatus::Claimed
        );
        let result: Result<Vec<Value>, _> = self
            .supabase
            .request_with_representation(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({
                    "status": WindowStatus::Free,
                    "updated_at": self.clock.now().to_rfc3339()
                })),
            )
            .await;

        if let Err(e) = result {
            // The window stays claimed with no booking behind it; operators
            // need to see this.
            error!("Failed to roll back claim on window {}: {}", window_id, e);
        }
    }

    async fn fetch_bookings(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<Booking>, SchedulingError> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Booking>, _>>()
            .map_err(|e| SchedulingError::DatabaseError(format!("failed to parse bookings: {}", e)))
    }
}

/// Opaque correlation handle pairing the two parties of a booking. Random,
/// fixed-length, no meaning beyond uniqueness.
fn generate_session_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}
