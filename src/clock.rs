use std::sync::Mutex;

use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Wall-clock source in shop-local time. Bookings are stored as naive local
/// date-times, so every "is this in the past" check goes through here.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct ShopClock {
    tz: Tz,
}

impl ShopClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for ShopClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }
}

/// A clock that only moves when told to.
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now
            .lock()
            .map(|guard| *guard)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}
