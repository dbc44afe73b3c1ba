// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Shortest availability window a provider may publish.
pub const MIN_WINDOW_MINUTES: i64 = 30;

// ==============================================================================
// AVAILABILITY WINDOW MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: WindowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    Free,
    Claimed,
}

impl fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowStatus::Free => write!(f, "free"),
            WindowStatus::Claimed => write!(f, "claimed"),
        }
    }
}

// ==============================================================================
// BOOKING MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub window_id: Uuid,
    /// Snapshot of the window's start at claim time; never re-derived.
    pub scheduled_at: DateTime<Utc>,
    pub status: BookingStatus,
    pub session_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Done,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Done | BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::Done => write!(f, "done"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWindowRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimWindowRequest {
    pub window_id: Uuid,
    /// The provider the caller believes owns the window. A stale or forged
    /// value makes the claim fail rather than booking someone else's time.
    pub provider_id: Uuid,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum SchedulingError {
    #[error("Window end must be after start")]
    InvalidRange,

    #[error("Window must be at least 30 minutes long")]
    InvalidDuration,

    #[error("Window overlaps an existing window for this provider")]
    OverlapConflict,

    #[error("Slot is no longer available")]
    SlotUnavailable,

    #[error("Not authorized to act on this record")]
    NotOwner,

    #[error("Window is claimed and cannot be removed")]
    WindowNotFree,

    #[error("Booking is already {0}")]
    AlreadyTerminal(BookingStatus),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

// ==============================================================================
// WINDOW ARITHMETIC
// ==============================================================================

/// Half-open interval overlap: `[a_start, a_end)` intersects `[b_start, b_end)`.
/// A window ending exactly when another starts does not overlap it.
pub fn windows_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

pub fn validate_window_bounds(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(), SchedulingError> {
    if end <= start {
        return Err(SchedulingError::InvalidRange);
    }
    if end - start < Duration::minutes(MIN_WINDOW_MINUTES) {
        return Err(SchedulingError::InvalidDuration);
    }
    Ok(())
}
