use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::db::queries::{self, BookingFilter};
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, NewBooking, Resource};

/// Persistence for bookings. Every read goes to storage; nothing here caches.
pub trait BookingStore: Send + Sync {
    fn occupied_instants(
        &self,
        resource_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<NaiveDateTime>, AppError>;

    fn is_taken(&self, resource_id: &str, instant: NaiveDateTime) -> Result<bool, AppError>;

    /// Fails with `Conflict` when a live booking already holds the instant.
    fn create(&self, booking: NewBooking, now: NaiveDateTime) -> Result<Booking, AppError>;

    fn update_status(
        &self,
        id: &str,
        status: BookingStatus,
        now: NaiveDateTime,
    ) -> Result<Booking, AppError>;

    fn delete(&self, id: &str) -> Result<(), AppError>;

    fn get(&self, id: &str) -> Result<Option<Booking>, AppError>;

    fn list(&self, filter: &BookingFilter) -> Result<Vec<Booking>, AppError>;

    fn for_counterparty(&self, counterparty: &str) -> Result<Vec<Booking>, AppError>;

    fn resources(&self) -> Result<Vec<Resource>, AppError>;

    fn resource(&self, id: &str) -> Result<Option<Resource>, AppError>;
}

pub struct SqliteBookingStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteBookingStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }
}

impl BookingStore for SqliteBookingStore {
    fn occupied_instants(
        &self,
        resource_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<NaiveDateTime>, AppError> {
        let conn = self.conn()?;
        queries::occupied_instants(&conn, resource_id, date)
    }

    fn is_taken(&self, resource_id: &str, instant: NaiveDateTime) -> Result<bool, AppError> {
        let conn = self.conn()?;
        queries::is_slot_taken(&conn, resource_id, &instant)
    }

    fn create(&self, new: NewBooking, now: NaiveDateTime) -> Result<Booking, AppError> {
        let booking = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            resource_id: new.resource_id,
            counterparty: new.counterparty,
            customer_name: new.customer_name,
            service: new.service,
            scheduled_at: new.scheduled_at,
            status: new.status,
            note: new.note,
            created_at: now,
            updated_at: now,
        };

        let conn = self.conn()?;
        queries::create_booking(&conn, &booking)?;

        tracing::info!(
            booking_id = %booking.id,
            resource_id = %booking.resource_id,
            scheduled_at = %booking.scheduled_at,
            "booking created"
        );
        Ok(booking)
    }

    fn update_status(
        &self,
        id: &str,
        status: BookingStatus,
        now: NaiveDateTime,
    ) -> Result<Booking, AppError> {
        let conn = self.conn()?;
        let current = queries::get_booking_by_id(&conn, id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

        if !current.status.can_transition_to(status) {
            return Err(AppError::InvalidTransition {
                from: current.status,
                to: status,
            });
        }
        if current.status == status {
            return Ok(current);
        }

        if !queries::update_booking_status(&conn, id, status, &now)? {
            return Err(AppError::NotFound(format!("booking {id}")));
        }

        tracing::info!(booking_id = %id, from = current.status.as_str(), to = status.as_str(), "booking status updated");

        Ok(Booking {
            status,
            updated_at: now,
            ..current
        })
    }

    fn delete(&self, id: &str) -> Result<(), AppError> {
        let conn = self.conn()?;
        if queries::delete_booking(&conn, id)? {
            tracing::info!(booking_id = %id, "booking deleted");
            Ok(())
        } else {
            Err(AppError::NotFound(format!("booking {id}")))
        }
    }

    fn get(&self, id: &str) -> Result<Option<Booking>, AppError> {
        let conn = self.conn()?;
        queries::get_booking_by_id(&conn, id)
    }

    fn list(&self, filter: &BookingFilter) -> Result<Vec<Booking>, AppError> {
        let conn = self.conn()?;
        queries::list_bookings(&conn, filter)
    }

    fn for_counterparty(&self, counterparty: &str) -> Result<Vec<Booking>, AppError> {
        let conn = self.conn()?;
        queries::get_bookings_for_counterparty(&conn, counterparty)
    }

    fn resources(&self) -> Result<Vec<Resource>, AppError> {
        let conn = self.conn()?;
        queries::list_resources(&conn)
    }

    fn resource(&self, id: &str) -> Result<Option<Resource>, AppError> {
        let conn = self.conn()?;
        queries::get_resource(&conn, id)
    }
}
