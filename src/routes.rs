use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/webhook/whatsapp",
            get(handlers::webhook::verify_webhook).post(handlers::webhook::receive_webhook),
        )
        .route(
            "/api/admin/appointments",
            get(handlers::admin::list_appointments),
        )
        .route(
            "/api/admin/appointments/:id",
            patch(handlers::admin::update_appointment).delete(handlers::admin::delete_appointment),
        )
        .route("/api/resources", get(handlers::bookings::list_resources))
        .route(
            "/api/resources/:id/slots",
            get(handlers::bookings::get_slots),
        )
        .route(
            "/api/bookings",
            get(handlers::bookings::my_bookings).post(handlers::bookings::create_booking),
        )
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
