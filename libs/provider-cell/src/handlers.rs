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

use crate::models::{ProviderError, SetPresenceRequest};
use crate::services::presence::PresenceService;

/// Explicit presence toggle; a provider can only change their own status.
#[axum::debug_handler]
pub async fn set_presence(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SetPresenceRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_provider() {
        return Err(AppError::Forbidden(
            "Only providers have a presence status".to_string(),
        ));
    }
    let provider_id = user
        .uuid()
        .ok_or_else(|| AppError::Auth("Invalid user id in token".to_string()))?;

    let service = PresenceService::new(&state);
    let provider = service
        .set_presence(provider_id, request.presence, auth.token())
        .await
        .map_err(|e| match e {
            ProviderError::NotFound => AppError::NotFound("Provider not found".to_string()),
            _ => AppError::Database(e.to_string()),
        })?;

    Ok(Json(json!({
        "success": true,
        "provider": provider,
        "message": format!("Status changed to {}", provider.presence)
    })))
}

#[axum::debug_handler]
pub async fn list_online_providers(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = PresenceService::new(&state);
    let providers = service
        .list_online_providers(auth.token())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({ "providers": providers })))
}

#[axum::debug_handler]
pub async fn get_provider(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = PresenceService::new(&state);
    let provider = service
        .get_provider(provider_id, auth.token())
        .await
        .map_err(|e| match e {
            ProviderError::NotFound => AppError::NotFound("Provider not found".to_string()),
            _ => AppError::Database(e.to_string()),
        })?;

    Ok(Json(json!(provider)))
}
