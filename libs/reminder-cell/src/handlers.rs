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

use crate::models::{CreateReminderRequest, ReminderError};
use crate::services::reminders::ReminderService;

fn owner_uuid(user: &User) -> Result<Uuid, AppError> {
    if !user.is_patient() {
        return Err(AppError::Forbidden(
            "Only patients manage medication reminders".to_string(),
        ));
    }
    user.uuid()
        .ok_or_else(|| AppError::Auth("Invalid user id in token".to_string()))
}

#[axum::debug_handler]
pub async fn create_reminder(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateReminderRequest>,
) -> Result<Json<Value>, AppError> {
    let owner_id = owner_uuid(&user)?;

    let service = ReminderService::new(&state);
    let reminder = service
        .create_reminder(owner_id, request, auth.token())
        .await
        .map_err(|e| match e {
            ReminderError::ValidationError(msg) => AppError::BadRequest(msg),
            _ => AppError::Database(e.to_string()),
        })?;

    Ok(Json(json!({
        "success": true,
        "reminder": reminder,
        "message": "Reminder added successfully"
    })))
}

#[axum::debug_handler]
pub async fn list_reminders(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let owner_id = owner_uuid(&user)?;

    let service = ReminderService::new(&state);
    let reminders = service
        .list_for_owner(owner_id, auth.token())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({ "reminders": reminders })))
}

#[axum::debug_handler]
pub async fn delete_reminder(
    State(state): State<Arc<AppConfig>>,
    Path(reminder_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let owner_id = owner_uuid(&user)?;

    let service = ReminderService::new(&state);
    service
        .delete_reminder(reminder_id, owner_id, auth.token())
        .await
        .map_err(|e| match e {
            ReminderError::NotOwner => {
                AppError::Forbidden("Not authorized to delete this reminder".to_string())
            }
            _ => AppError::Database(e.to_string()),
        })?;

    Ok(Json(json!({
        "success": true,
        "message": "Reminder deleted"
    })))
}
