use std::sync::Arc;

use axum::{routing::get, Router};

use provider_cell::router::provider_routes;
use reminder_cell::router::reminder_routes;
use scheduling_cell::router::scheduling_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Teleclinic API is running!" }))
        .nest("/providers", provider_routes(state.clone()))
        .nest("/scheduling", scheduling_routes(state.clone()))
        .nest("/reminders", reminder_routes(state.clone()))
}
