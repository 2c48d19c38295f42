use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::errors::AppError;
use crate::models::SlotCatalog;
use crate::services::store::BookingStore;

/// Catalog times still bookable on `date`, ascending.
///
/// A time is dropped when a live booking already starts at that instant, or
/// when `date` is today and the time is not after `now`. Days before today
/// yield nothing.
pub fn available_times(
    catalog: &SlotCatalog,
    date: NaiveDate,
    occupied: &[NaiveDateTime],
    now: NaiveDateTime,
) -> Vec<NaiveTime> {
    let today = now.date();
    if date < today {
        return Vec::new();
    }

    catalog
        .times()
        .iter()
        .copied()
        .filter(|time| !(date == today && *time <= now.time()))
        .filter(|time| !occupied.contains(&date.and_time(*time)))
        .collect()
}

/// Free instants over `days` consecutive days starting today, in
/// chronological order. Reads current bookings for each day.
pub fn upcoming_slots(
    store: &dyn BookingStore,
    resource_id: &str,
    catalog: &SlotCatalog,
    days: u32,
    now: NaiveDateTime,
) -> Result<Vec<NaiveDateTime>, AppError> {
    let mut slots = Vec::new();
    for offset in 0..days {
        let date = now.date() + Duration::days(offset as i64);
        let occupied = store.occupied_instants(resource_id, date)?;
        slots.extend(
            available_times(catalog, date, &occupied, now)
                .into_iter()
                .map(|time| date.and_time(time)),
        );
    }
    Ok(slots)
}
