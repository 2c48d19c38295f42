use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries::BookingFilter;
use crate::errors::AppError;
use crate::models::BookingStatus;
use crate::services::notifications::{self, NotificationOutcome};
use crate::services::scheduling::BookingView;
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if expected_token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/admin/appointments
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub search: Option<String>,
    pub status: Option<String>,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<Vec<BookingView>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    // "ALL" and unknown values both mean no status filter.
    let status = query.status.as_deref().and_then(BookingStatus::parse);
    let filter = BookingFilter {
        search: query.search.filter(|s| !s.trim().is_empty()),
        status,
        ..Default::default()
    };

    let now = state.clock.now();
    let bookings = state
        .store
        .list(&filter)?
        .into_iter()
        .map(|b| BookingView::new(b, now))
        .collect();

    Ok(Json(bookings))
}

// PATCH /api/admin/appointments/:id
#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Serialize)]
pub struct UpdateStatusResponse {
    pub appointment: BookingView,
    pub notification: NotificationOutcome,
}

pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<UpdateStatusResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let status = BookingStatus::parse(&req.status)
        .ok_or_else(|| AppError::Validation(format!("unknown status '{}'", req.status)))?;

    let previous = state
        .store
        .get(&id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?
        .status;

    let now = state.clock.now();
    let booking = state.store.update_status(&id, status, now)?;
    let notification =
        notifications::notify_status_change(state.messaging.as_ref(), &booking, previous).await;

    Ok(Json(UpdateStatusResponse {
        appointment: BookingView::new(booking, now),
        notification,
    }))
}

// DELETE /api/admin/appointments/:id
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    state.store.delete(&id)?;
    tracing::info!(booking_id = %id, "booking deleted by admin");

    Ok(StatusCode::NO_CONTENT)
}
