use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, DisplayStatus, NewBooking, SlotCatalog};
use crate::services::conversation::MAX_NOTE_CHARS;
use crate::services::slots::available_times;
use crate::services::store::BookingStore;

#[derive(Debug, PartialEq)]
pub enum SchedulingError {
    PastDate,
    ElapsedTime,
    NotOffered { hours: String },
}

impl std::fmt::Display for SchedulingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulingError::PastDate => write!(f, "That day has already passed."),
            SchedulingError::ElapsedTime => {
                write!(f, "That time has already passed today. Please pick a later time.")
            }
            SchedulingError::NotOffered { hours } => {
                write!(f, "That time is not offered. Available times: {hours}")
            }
        }
    }
}

impl From<SchedulingError> for AppError {
    fn from(e: SchedulingError) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// Checks a requested day and time against the catalog and the clock.
/// Availability is not checked here; only the store can decide that.
pub fn validate_booking_time(
    catalog: &SlotCatalog,
    date: NaiveDate,
    time: NaiveTime,
    now: NaiveDateTime,
) -> Result<NaiveDateTime, SchedulingError> {
    if date < now.date() {
        return Err(SchedulingError::PastDate);
    }
    if !catalog.contains(time) {
        return Err(SchedulingError::NotOffered {
            hours: catalog.to_human_readable(),
        });
    }
    let instant = date.and_time(time);
    if instant <= now {
        return Err(SchedulingError::ElapsedTime);
    }
    Ok(instant)
}

pub fn free_times(
    store: &dyn BookingStore,
    catalog: &SlotCatalog,
    resource_id: &str,
    date: NaiveDate,
    now: NaiveDateTime,
) -> Result<Vec<NaiveTime>, AppError> {
    ensure_resource(store, resource_id)?;
    if date < now.date() {
        return Err(SchedulingError::PastDate.into());
    }
    let occupied = store.occupied_instants(resource_id, date)?;
    Ok(available_times(catalog, date, &occupied, now))
}

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub resource_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub note: Option<String>,
    pub counterparty: String,
}

/// Creates a confirmed booking for a signed-in user. Whatever list the client
/// showed, the store's uniqueness check is what decides.
pub fn book(
    store: &dyn BookingStore,
    catalog: &SlotCatalog,
    request: BookingRequest,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    ensure_resource(store, &request.resource_id)?;
    let scheduled_at = validate_booking_time(catalog, request.date, request.time, now)?;

    let note = request
        .note
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    if note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_CHARS) {
        return Err(AppError::Validation(format!(
            "note must be at most {MAX_NOTE_CHARS} characters"
        )));
    }

    store.create(
        NewBooking {
            resource_id: request.resource_id,
            counterparty: request.counterparty,
            customer_name: None,
            service: None,
            scheduled_at,
            status: BookingStatus::Confirmed,
            note,
        },
        now,
    )
}

/// Soft-cancels a booking on behalf of its owner.
pub fn cancel_own(
    store: &dyn BookingStore,
    id: &str,
    counterparty: &str,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    match store.get(id)? {
        Some(booking) if booking.counterparty == counterparty => {
            store.update_status(id, BookingStatus::Canceled, now)
        }
        _ => Err(AppError::NotFound(format!("booking {id}"))),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub display_status: DisplayStatus,
}

impl BookingView {
    pub fn new(booking: Booking, now: NaiveDateTime) -> Self {
        let display_status = booking.display_status(now);
        Self {
            booking,
            display_status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MyBookings {
    pub upcoming: Vec<BookingView>,
    pub concluded: Vec<BookingView>,
}

/// Upcoming: live bookings not yet started, soonest first. Concluded:
/// confirmed bookings in the past, most recent first.
pub fn my_bookings(
    store: &dyn BookingStore,
    counterparty: &str,
    now: NaiveDateTime,
) -> Result<MyBookings, AppError> {
    let mut upcoming = vec![];
    let mut concluded = vec![];

    for booking in store.for_counterparty(counterparty)? {
        let view = BookingView::new(booking, now);
        let status = view.display_status;
        let ahead = view.booking.scheduled_at >= now;
        match status {
            DisplayStatus::Concluded => concluded.push(view),
            DisplayStatus::Canceled => {}
            DisplayStatus::Pending | DisplayStatus::Confirmed if ahead => {
                upcoming.push(view)
            }
            DisplayStatus::Pending | DisplayStatus::Confirmed => {}
        }
    }
    concluded.reverse();

    Ok(MyBookings {
        upcoming,
        concluded,
    })
}

fn ensure_resource(store: &dyn BookingStore, resource_id: &str) -> Result<(), AppError> {
    match store.resource(resource_id)? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("resource {resource_id}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::db;
    use crate::services::store::SqliteBookingStore;

    fn store() -> SqliteBookingStore {
        let conn = db::init_db(":memory:").unwrap();
        SqliteBookingStore::new(Arc::new(Mutex::new(conn)))
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn request(date: &str, time: &str, who: &str) -> BookingRequest {
        BookingRequest {
            resource_id: "lavagem".to_string(),
            date: day(date),
            time: t(time),
            note: None,
            counterparty: who.to_string(),
        }
    }

    #[test]
    fn test_validate_booking_time() {
        let catalog = SlotCatalog::booking_ui();
        let now = dt("2025-06-16 09:10");

        assert_eq!(
            validate_booking_time(&catalog, day("2025-06-16"), t("09:30"), now),
            Ok(dt("2025-06-16 09:30"))
        );
        assert_eq!(
            validate_booking_time(&catalog, day("2025-06-16"), t("09:00"), now),
            Err(SchedulingError::ElapsedTime)
        );
        assert_eq!(
            validate_booking_time(&catalog, day("2025-06-15"), t("10:00"), now),
            Err(SchedulingError::PastDate)
        );
        assert!(matches!(
            validate_booking_time(&catalog, day("2025-06-17"), t("09:15"), now),
            Err(SchedulingError::NotOffered { .. })
        ));
    }

    #[test]
    fn test_book_then_slot_disappears() {
        let store = store();
        let catalog = SlotCatalog::booking_ui();
        let now = dt("2025-06-16 07:00");

        let before = free_times(&store, &catalog, "lavagem", day("2025-06-16"), now).unwrap();
        assert!(before.contains(&t("10:00")));

        let booking = book(&store, &catalog, request("2025-06-16", "10:00", "user-1"), now).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);

        let after = free_times(&store, &catalog, "lavagem", day("2025-06-16"), now).unwrap();
        assert!(!after.contains(&t("10:00")));
        assert_eq!(after.len(), before.len() - 1);
    }

    #[test]
    fn test_second_booking_on_same_slot_conflicts() {
        let store = store();
        let catalog = SlotCatalog::booking_ui();
        let now = dt("2025-06-16 07:00");

        book(&store, &catalog, request("2025-06-16", "10:00", "user-1"), now).unwrap();
        let err = book(&store, &catalog, request("2025-06-16", "10:00", "user-2"), now).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_book_unknown_resource() {
        let store = store();
        let mut req = request("2025-06-16", "10:00", "user-1");
        req.resource_id = "nope".to_string();
        let err = book(&store, &SlotCatalog::booking_ui(), req, dt("2025-06-16 07:00")).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_book_rejects_long_note() {
        let store = store();
        let mut req = request("2025-06-16", "10:00", "user-1");
        req.note = Some("x".repeat(201));
        let err = book(&store, &SlotCatalog::booking_ui(), req, dt("2025-06-16 07:00")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_free_times_rejects_past_day() {
        let store = store();
        let err = free_times(
            &store,
            &SlotCatalog::booking_ui(),
            "lavagem",
            day("2025-06-15"),
            dt("2025-06-16 07:00"),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_cancel_own_only_for_owner() {
        let store = store();
        let catalog = SlotCatalog::booking_ui();
        let now = dt("2025-06-16 07:00");
        let booking = book(&store, &catalog, request("2025-06-16", "10:00", "user-1"), now).unwrap();

        let err = cancel_own(&store, &booking.id, "user-2", now).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let canceled = cancel_own(&store, &booking.id, "user-1", now).unwrap();
        assert_eq!(canceled.status, BookingStatus::Canceled);

        // The slot is free again.
        book(&store, &catalog, request("2025-06-16", "10:00", "user-2"), now).unwrap();
    }

    #[test]
    fn test_my_bookings_splits_upcoming_and_concluded() {
        let store = store();
        let catalog = SlotCatalog::booking_ui();
        let booked_at = dt("2025-06-10 07:00");

        book(&store, &catalog, request("2025-06-10", "10:00", "user-1"), booked_at).unwrap();
        book(&store, &catalog, request("2025-06-12", "10:00", "user-1"), booked_at).unwrap();
        book(&store, &catalog, request("2025-06-20", "10:00", "user-1"), booked_at).unwrap();
        let canceled = book(&store, &catalog, request("2025-06-21", "10:00", "user-1"), booked_at).unwrap();
        cancel_own(&store, &canceled.id, "user-1", booked_at).unwrap();
        book(&store, &catalog, request("2025-06-22", "10:00", "user-2"), booked_at).unwrap();

        let mine = my_bookings(&store, "user-1", dt("2025-06-16 12:00")).unwrap();
        assert_eq!(mine.upcoming.len(), 1);
        assert_eq!(mine.upcoming[0].booking.scheduled_at, dt("2025-06-20 10:00"));
        assert_eq!(mine.upcoming[0].display_status, DisplayStatus::Confirmed);

        assert_eq!(mine.concluded.len(), 2);
        assert_eq!(mine.concluded[0].booking.scheduled_at, dt("2025-06-12 10:00"));
        assert_eq!(mine.concluded[1].booking.scheduled_at, dt("2025-06-10 10:00"));
        assert!(mine
            .concluded
            .iter()
            .all(|v| v.display_status == DisplayStatus::Concluded));
    }
}
