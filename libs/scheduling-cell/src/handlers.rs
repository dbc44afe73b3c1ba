// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{ClaimWindowRequest, CreateWindowRequest, SchedulingError};
use crate::services::allocator::BookingAllocator;
use crate::services::windows::AvailabilityService;

fn caller_uuid(user: &User) -> Result<Uuid, AppError> {
    user.uuid()
        .ok_or_else(|| AppError::Auth("Invalid user id in token".to_string()))
}

// ==============================================================================
// WINDOW HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn propose_window(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateWindowRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_provider() {
        return Err(AppError::Forbidden(
            "Only providers can publish availability".to_string(),
        ));
    }
    let provider_id = caller_uuid(&user)?;

    let service = AvailabilityService::new(&state);
    let window = service
        .propose_window(provider_id, request, auth.token())
        .await
        .map_err(|e| match e {
            SchedulingError::InvalidRange | SchedulingError::InvalidDuration => {
                AppError::BadRequest(e.to_string())
            }
            SchedulingError::OverlapConflict => {
                AppError::Conflict("Overlapping with existing availability".to_string())
            }
            _ => AppError::Database(e.to_string()),
        })?;

    Ok(Json(json!({
        "success": true,
        "window": window,
        "message": "Availability added successfully"
    })))
}

#[axum::debug_handler]
pub async fn list_my_windows(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_provider() {
        return Err(AppError::Forbidden(
            "Only providers have availability windows".to_string(),
        ));
    }
    let provider_id = caller_uuid(&user)?;

    let service = AvailabilityService::new(&state);
    let windows = service
        .list_windows(provider_id, auth.token())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({ "windows": windows })))
}

/// Free future windows of one provider — what a patient sees when booking.
#[axum::debug_handler]
pub async fn list_bookable_windows(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);
    let windows = service
        .list_bookable_windows(provider_id, auth.token())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({ "windows": windows })))
}

#[axum::debug_handler]
pub async fn delete_window(
    State(state): State<Arc<AppConfig>>,
    Path(window_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_provider() {
        return Err(AppError::Forbidden("Unauthorized action".to_string()));
    }
    let provider_id = caller_uuid(&user)?;

    let service = AvailabilityService::new(&state);
    service
        .delete_window(window_id, provider_id, auth.token())
        .await
        .map_err(|e| match e {
            SchedulingError::WindowNotFree => {
                AppError::Conflict("Window is claimed and cannot be removed".to_string())
            }
            SchedulingError::NotOwner => AppError::Forbidden("Unauthorized action".to_string()),
            _ => AppError::Database(e.to_string()),
        })?;

    Ok(Json(json!({
        "success": true,
        "message": "Time slot deleted successfully"
    })))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn claim_window(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ClaimWindowRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_patient() {
        return Err(AppError::Forbidden(
            "Only patients can book appointments".to_string(),
        ));
    }
    let patient_id = caller_uuid(&user)?;

    let allocator = BookingAllocator::new(&state);
    let booking = allocator
        .claim_window(patient_id, request, auth.token())
        .await
        .map_err(|e| match e {
            SchedulingError::SlotUnavailable => {
                AppError::Conflict("Slot no longer available".to_string())
            }
            _ => AppError::Database(e.to_string()),
        })?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn cancel_booking(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_patient() {
        return Err(AppError::Forbidden(
            "Only patients can cancel their bookings".to_string(),
        ));
    }
    let patient_id = caller_uuid(&user)?;

    let allocator = BookingAllocator::new(&state);
    let booking = allocator
        .release_booking(booking_id, patient_id, auth.token())
        .await
        .map_err(|e| match e {
            SchedulingError::NotOwner => {
                AppError::Forbidden("Not authorized to cancel this booking".to_string())
            }
            SchedulingError::AlreadyTerminal(status) => {
                AppError::Conflict(format!("Booking is already {}", status))
            }
            _ => AppError::Database(e.to_string()),
        })?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn complete_booking(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_provider() {
        return Err(AppError::Forbidden(
            "Only providers can complete bookings".to_string(),
        ));
    }
    let provider_id = caller_uuid(&user)?;

    let allocator = BookingAllocator::new(&state);
    let booking = allocator
        .complete_booking(booking_id, provider_id, auth.token())
        .await
        .map_err(|e| match e {
            SchedulingError::NotOwner => {
                AppError::Forbidden("Not authorized to complete this booking".to_string())
            }
            SchedulingError::AlreadyTerminal(status) => {
                AppError::Conflict(format!("Booking is already {}", status))
            }
            _ => AppError::Database(e.to_string()),
        })?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": "Appointment marked complete"
    })))
}

/// Booking detail, including the session token that pairs the two parties.
/// Visible only to those two parties (or an admin).
#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_uuid(&user)?;

    let allocator = BookingAllocator::new(&state);
    let booking = allocator
        .get_booking(booking_id, auth.token())
        .await
        .map_err(|e| match e {
            SchedulingError::NotOwner => {
                AppError::Forbidden("Not authorized to view this booking".to_string())
            }
            _ => AppError::Database(e.to_string()),
        })?;

    let is_participant = booking.patient_id == caller || booking.provider_id == caller;
    if !is_participant && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view this booking".to_string(),
        ));
    }

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn list_my_bookings(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_uuid(&user)?;

    let allocator = BookingAllocator::new(&state);
    let bookings = if user.is_provider() {
        allocator.list_provider_bookings(caller, auth.token()).await
    } else {
        allocator.list_patient_bookings(caller, auth.token()).await
    }
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({ "bookings": bookings })))
}
