use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::slot_catalog::parse_time;
use crate::models::Resource;
use crate::services::scheduling::{self, BookingRequest, BookingView, MyBookings};
use crate::state::AppState;

/// The signed-in user, as forwarded by the front end.
fn current_user(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(AppError::Unauthorized)
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("invalid date '{raw}', expected YYYY-MM-DD")))
}

// GET /api/resources
pub async fn list_resources(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Resource>>, AppError> {
    Ok(Json(state.store.resources()?))
}

// GET /api/resources/:id/slots?date=YYYY-MM-DD
#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: String,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    pub resource_id: String,
    pub date: NaiveDate,
    pub times: Vec<String>,
}

pub async fn get_slots(
    State(state): State<Arc<AppState>>,
    Path(resource_id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    let date = parse_date(&query.date)?;
    let times = scheduling::free_times(
        state.store.as_ref(),
        &state.config.ui_slots,
        &resource_id,
        date,
        state.clock.now(),
    )?;

    Ok(Json(SlotsResponse {
        resource_id,
        date,
        times: times.iter().map(|t| t.format("%H:%M").to_string()).collect(),
    }))
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub resource_id: String,
    pub date: String,
    pub time: String,
    pub note: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingView>), AppError> {
    let user = current_user(&headers)?;
    let date = parse_date(&req.date)?;
    let time = parse_time(&req.time)
        .map_err(|_| AppError::Validation(format!("invalid time '{}', expected HH:MM", req.time)))?;

    let now = state.clock.now();
    let booking = scheduling::book(
        state.store.as_ref(),
        &state.config.ui_slots,
        BookingRequest {
            resource_id: req.resource_id,
            date,
            time,
            note: req.note,
            counterparty: user,
        },
        now,
    )?;

    Ok((StatusCode::CREATED, Json(BookingView::new(booking, now))))
}

// GET /api/bookings
pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MyBookings>, AppError> {
    let user = current_user(&headers)?;
    let bookings = scheduling::my_bookings(state.store.as_ref(), &user, state.clock.now())?;
    Ok(Json(bookings))
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingView>, AppError> {
    let user = current_user(&headers)?;
    let now = state.clock.now();
    let booking = scheduling::cancel_own(state.store.as_ref(), &id, &user, now)?;
    Ok(Json(BookingView::new(booking, now)))
}
