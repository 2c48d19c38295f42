use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, ErrorCode};

use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Resource};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const BOOKING_COLUMNS: &str = "id, resource_id, counterparty, customer_name, service, scheduled_at, status, note, created_at, updated_at";

pub const DEFAULT_LIST_LIMIT: i64 = 100;

// ── Bookings ──

/// Inserts a booking. The partial unique index on (resource_id, scheduled_at)
/// is the only double-booking gate; its violation maps to `Conflict`.
pub fn create_booking(conn: &Connection, booking: &Booking) -> Result<(), AppError> {
    let result = conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        params![
            booking.id,
            booking.resource_id,
            booking.counterparty,
            booking.customer_name,
            booking.service,
            fmt(&booking.scheduled_at),
            booking.status.as_str(),
            booking.note,
            fmt(&booking.created_at),
            fmt(&booking.updated_at),
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            Err(AppError::NotFound(format!(
                "resource {}",
                booking.resource_id
            )))
        }
        Err(e) if is_live_slot_violation(&e) => Err(AppError::Conflict),
        Err(e) => Err(e.into()),
    }
}

/// Only the live-slot unique index means "already booked"; primary key, CHECK
/// and NOT NULL failures stay database errors.
fn is_live_slot_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

/// Start instants of every non-canceled booking for a resource on a day.
pub fn occupied_instants(
    conn: &Connection,
    resource_id: &str,
    date: NaiveDate,
) -> Result<Vec<NaiveDateTime>, AppError> {
    let day_start = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    let day_end = date.and_hms_opt(23, 59, 59).unwrap_or_default();

    let mut stmt = conn.prepare(
        "SELECT scheduled_at FROM bookings
         WHERE resource_id = ?1 AND scheduled_at >= ?2 AND scheduled_at <= ?3 AND status != 'canceled'
         ORDER BY scheduled_at ASC",
    )?;

    let rows = stmt.query_map(params![resource_id, fmt(&day_start), fmt(&day_end)], |row| {
        let raw: String = row.get(0)?;
        parse_datetime(0, &raw)
    })?;

    let mut instants = vec![];
    for row in rows {
        instants.push(row?);
    }
    Ok(instants)
}

pub fn is_slot_taken(
    conn: &Connection,
    resource_id: &str,
    instant: &NaiveDateTime,
) -> Result<bool, AppError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE resource_id = ?1 AND scheduled_at = ?2 AND status != 'canceled'",
        params![resource_id, fmt(instant)],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> Result<Option<Booking>, AppError> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        parse_booking_row,
    );

    match result {
        Ok(booking) => Ok(Some(booking)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Returns false when no booking has that id.
pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    now: &NaiveDateTime,
) -> Result<bool, AppError> {
    let result = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), fmt(now), id],
    );
    Ok(result? > 0)
}

pub fn delete_booking(conn: &Connection, id: &str) -> Result<bool, AppError> {
    let count = conn.execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    /// Case-insensitive substring of the customer name or phone.
    pub search: Option<String>,
    pub status: Option<BookingStatus>,
    pub limit: Option<i64>,
}

pub fn list_bookings(conn: &Connection, filter: &BookingFilter) -> Result<Vec<Booking>, AppError> {
    let mut clauses: Vec<String> = vec![];
    let mut params_vec: Vec<Box<dyn ToSql>> = vec![];

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        params_vec.push(Box::new(format!("%{}%", escape_like(search))));
        let idx = params_vec.len();
        clauses.push(format!(
            "(customer_name LIKE ?{idx} ESCAPE '\\' OR counterparty LIKE ?{idx} ESCAPE '\\')"
        ));
    }

    if let Some(status) = filter.status {
        params_vec.push(Box::new(status.as_str()));
        clauses.push(format!("status = ?{}", params_vec.len()));
    }

    params_vec.push(Box::new(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT)));
    let limit_idx = params_vec.len();

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings {where_sql} ORDER BY scheduled_at ASC LIMIT ?{limit_idx}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), parse_booking_row)?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

pub fn get_bookings_for_counterparty(
    conn: &Connection,
    counterparty: &str,
) -> Result<Vec<Booking>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE counterparty = ?1 ORDER BY scheduled_at ASC"
    ))?;

    let rows = stmt.query_map(params![counterparty], parse_booking_row)?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &rusqlite::Row) -> rusqlite::Result<Booking> {
    let scheduled_at: String = row.get(5)?;
    let status: String = row.get(6)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    let status = BookingStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            Type::Text,
            format!("unknown booking status: {status}").into(),
        )
    })?;

    Ok(Booking {
        id: row.get(0)?,
        resource_id: row.get(1)?,
        counterparty: row.get(2)?,
        customer_name: row.get(3)?,
        service: row.get(4)?,
        scheduled_at: parse_datetime(5, &scheduled_at)?,
        status,
        note: row.get(7)?,
        created_at: parse_datetime(8, &created_at)?,
        updated_at: parse_datetime(9, &updated_at)?,
    })
}

// ── Resources ──

pub fn list_resources(conn: &Connection) -> Result<Vec<Resource>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, price_cents FROM resources ORDER BY name ASC",
    )?;
    let rows = stmt.query_map([], parse_resource_row)?;

    let mut resources = vec![];
    for row in rows {
        resources.push(row?);
    }
    Ok(resources)
}

pub fn get_resource(conn: &Connection, id: &str) -> Result<Option<Resource>, AppError> {
    let result = conn.query_row(
        "SELECT id, name, description, price_cents FROM resources WHERE id = ?1",
        params![id],
        parse_resource_row,
    );

    match result {
        Ok(resource) => Ok(Some(resource)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_resource_row(row: &rusqlite::Row) -> rusqlite::Result<Resource> {
    Ok(Resource {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price_cents: row.get(3)?,
    })
}

// ── Helpers ──

fn fmt(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

fn parse_datetime(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn booking(id: &str, resource: &str, at: &str, status: BookingStatus) -> Booking {
        let now = dt("2025-06-01 08:00");
        Booking {
            id: id.to_string(),
            resource_id: resource.to_string(),
            counterparty: "5547999990000".to_string(),
            customer_name: Some("Maria".to_string()),
            service: None,
            scheduled_at: dt(at),
            status,
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_create_and_get() {
        let conn = setup_db();
        create_booking(&conn, &booking("b1", "oficina", "2025-06-16 10:00", BookingStatus::Pending)).unwrap();

        let found = get_booking_by_id(&conn, "b1").unwrap().unwrap();
        assert_eq!(found.scheduled_at, dt("2025-06-16 10:00"));
        assert_eq!(found.status, BookingStatus::Pending);
        assert_eq!(found.customer_name.as_deref(), Some("Maria"));
        assert!(get_booking_by_id(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_live_slot_is_conflict() {
        let conn = setup_db();
        create_booking(&conn, &booking("b1", "oficina", "2025-06-16 10:00", BookingStatus::Confirmed)).unwrap();

        let err = create_booking(&conn, &booking("b2", "oficina", "2025-06-16 10:00", BookingStatus::Pending))
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict));
    }

    #[test]
    fn test_canceled_slot_can_be_rebooked() {
        let conn = setup_db();
        create_booking(&conn, &booking("b1", "oficina", "2025-06-16 10:00", BookingStatus::Canceled)).unwrap();
        create_booking(&conn, &booking("b2", "oficina", "2025-06-16 10:00", BookingStatus::Pending)).unwrap();
    }

    #[test]
    fn test_same_instant_different_resource_is_fine() {
        let conn = setup_db();
        create_booking(&conn, &booking("b1", "oficina", "2025-06-16 10:00", BookingStatus::Pending)).unwrap();
        create_booking(&conn, &booking("b2", "lavagem", "2025-06-16 10:00", BookingStatus::Pending)).unwrap();
    }

    #[test]
    fn test_unknown_resource_is_not_found() {
        let conn = setup_db();
        let err = create_booking(&conn, &booking("b1", "nope", "2025-06-16 10:00", BookingStatus::Pending))
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_duplicate_id_is_not_a_slot_conflict() {
        let conn = setup_db();
        create_booking(&conn, &booking("b1", "oficina", "2025-06-16 10:00", BookingStatus::Pending)).unwrap();

        // Different slot, same primary key.
        let err = create_booking(&conn, &booking("b1", "oficina", "2025-06-16 11:00", BookingStatus::Pending))
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_occupied_instants_skips_canceled_and_other_days() {
        let conn = setup_db();
        create_booking(&conn, &booking("b1", "oficina", "2025-06-16 10:00", BookingStatus::Confirmed)).unwrap();
        create_booking(&conn, &booking("b2", "oficina", "2025-06-16 11:00", BookingStatus::Canceled)).unwrap();
        create_booking(&conn, &booking("b3", "oficina", "2025-06-17 10:00", BookingStatus::Pending)).unwrap();
        create_booking(&conn, &booking("b4", "lavagem", "2025-06-16 09:00", BookingStatus::Pending)).unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        let occupied = occupied_instants(&conn, "oficina", day).unwrap();
        assert_eq!(occupied, vec![dt("2025-06-16 10:00")]);

        assert!(is_slot_taken(&conn, "oficina", &dt("2025-06-16 10:00")).unwrap());
        assert!(!is_slot_taken(&conn, "oficina", &dt("2025-06-16 11:00")).unwrap());
    }

    #[test]
    fn test_update_and_delete() {
        let conn = setup_db();
        create_booking(&conn, &booking("b1", "oficina", "2025-06-16 10:00", BookingStatus::Pending)).unwrap();

        let now = dt("2025-06-02 09:00");
        assert!(update_booking_status(&conn, "b1", BookingStatus::Confirmed, &now).unwrap());
        let found = get_booking_by_id(&conn, "b1").unwrap().unwrap();
        assert_eq!(found.status, BookingStatus::Confirmed);
        assert_eq!(found.updated_at, now);

        assert!(!update_booking_status(&conn, "missing", BookingStatus::Confirmed, &now).unwrap());

        assert!(delete_booking(&conn, "b1").unwrap());
        assert!(!delete_booking(&conn, "b1").unwrap());
    }

    #[test]
    fn test_list_filters_and_orders() {
        let conn = setup_db();
        let mut joao = booking("b1", "oficina", "2025-06-17 10:00", BookingStatus::Pending);
        joao.customer_name = Some("João".to_string());
        joao.counterparty = "5547911112222".to_string();
        create_booking(&conn, &joao).unwrap();
        create_booking(&conn, &booking("b2", "oficina", "2025-06-16 10:00", BookingStatus::Confirmed)).unwrap();

        let all = list_bookings(&conn, &BookingFilter::default()).unwrap();
        assert_eq!(all.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(), vec!["b2", "b1"]);

        let by_name = list_bookings(
            &conn,
            &BookingFilter {
                search: Some("mar".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, "b2");

        let by_phone = list_bookings(
            &conn,
            &BookingFilter {
                search: Some("1111".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_phone.len(), 1);
        assert_eq!(by_phone[0].id, "b1");

        let pending = list_bookings(
            &conn,
            &BookingFilter {
                status: Some(BookingStatus::Pending),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "b1");

        let limited = list_bookings(
            &conn,
            &BookingFilter {
                limit: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_resources_are_seeded() {
        let conn = setup_db();
        let resources = list_resources(&conn).unwrap();
        assert!(resources.iter().any(|r| r.id == "oficina"));
        assert_eq!(get_resource(&conn, "lavagem").unwrap().unwrap().price_cents, 4500);
        assert!(get_resource(&conn, "nope").unwrap().is_none());
    }
}
