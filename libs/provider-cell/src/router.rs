use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn provider_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/presence", put(handlers::set_presence))
        .route("/online", get(handlers::list_online_providers))
        .route("/{provider_id}", get(handlers::get_provider))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
