use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub medication: String,
    pub due_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub frequency: ReminderFrequency,
    /// Only meaningful for `once`; recurring reminders never set it.
    pub delivered: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderFrequency {
    Once,
    Daily,
    Weekly,
}

impl ReminderFrequency {
    /// How far a due instant advances after firing; `None` for one-shots.
    pub fn period(&self) -> Option<Duration> {
        match self {
            ReminderFrequency::Once => None,
            ReminderFrequency::Daily => Some(Duration::hours(24)),
            ReminderFrequency::Weekly => Some(Duration::days(7)),
        }
    }
}

impl Default for ReminderFrequency {
    fn default() -> Self {
        ReminderFrequency::Once
    }
}

impl fmt::Display for ReminderFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderFrequency::Once => write!(f, "once"),
            ReminderFrequency::Daily => write!(f, "daily"),
            ReminderFrequency::Weekly => write!(f, "weekly"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReminderRequest {
    pub medication: String,
    pub due_at: DateTime<Utc>,
    pub notes: Option<String>,
    #[serde(default)]
    pub frequency: ReminderFrequency,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum ReminderError {
    #[error("Not authorized to act on this reminder")]
    NotOwner,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Delivery failed: {0}")]
    DeliveryError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn once_has_no_period() {
        assert!(ReminderFrequency::Once.period().is_none());
    }

    #[test]
    fn recurring_periods() {
        assert_eq!(
            ReminderFrequency::Daily.period(),
            Some(Duration::hours(24))
        );
        assert_eq!(ReminderFrequency::Weekly.period(), Some(Duration::days(7)));
    }

    #[test]
    fn frequency_defaults_to_once_in_requests() {
        let request: CreateReminderRequest = serde_json::from_value(serde_json::json!({
            "medication": "Amoxicillin",
            "due_at": "2025-06-02T08:00:00Z"
        }))
        .unwrap();
        assert_eq!(request.frequency, ReminderFrequency::Once);
    }

    #[test]
    fn malformed_due_instant_is_rejected() {
        let result: Result<CreateReminderRequest, _> =
            serde_json::from_value(serde_json::json!({
                "medication": "Amoxicillin",
                "due_at": "not-a-timestamp"
            }));
        assert!(result.is_err());
    }
}
