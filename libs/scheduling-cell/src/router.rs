use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn scheduling_routes(state: Arc<AppConfig>) -> Router {
    // Every scheduling operation requires an authenticated identity
    let protected_routes = Router::new()
        .route("/windows", post(handlers::propose_window))
        .route("/windows", get(handlers::list_my_windows))
        .route("/windows/{window_id}", delete(handlers::delete_window))
        .route(
            "/providers/{provider_id}/windows",
            get(handlers::list_bookable_windows),
        )
        .route("/bookings", post(handlers::claim_window))
        .route("/bookings", get(handlers::list_my_bookings))
        .route("/bookings/{booking_id}", get(handlers::get_booking))
        .route("/bookings/{booking_id}/cancel", post(handlers::cancel_booking))
        .route(
            "/bookings/{booking_id}/complete",
            post(handlers::complete_booking),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
