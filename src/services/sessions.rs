use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, NaiveDateTime};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::Session;

type SessionSlot = Arc<AsyncMutex<Option<Session>>>;

/// Exclusive access to one phone's conversation. `None` means no session is
/// in flight; set it back to `None` to end the conversation.
pub type SessionGuard = OwnedMutexGuard<Option<Session>>;

/// In-memory conversation sessions keyed by phone number.
///
/// Messages for the same phone are serialized: `checkout` waits until the
/// previous holder drops its guard. Sessions idle for longer than `ttl` are
/// discarded, and the table never grows past `capacity` idle entries.
pub struct SessionStore {
    slots: Mutex<HashMap<String, SessionSlot>>,
    ttl: Duration,
    capacity: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub async fn checkout(&self, phone: &str, now: NaiveDateTime) -> SessionGuard {
        let slot = {
            let mut slots = self.lock_slots();
            if !slots.contains_key(phone) && slots.len() >= self.capacity {
                self.make_room(&mut slots, now);
            }
            Arc::clone(
                slots
                    .entry(phone.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(None))),
            )
        };

        let mut guard = slot.lock_owned().await;
        if guard.as_ref().is_some_and(|s| self.is_expired(s, now)) {
            tracing::info!(phone, "conversation session expired");
            *guard = None;
        }
        guard
    }

    /// Drops expired and finished sessions nobody is using. Returns how many
    /// entries were removed.
    pub fn evict_expired(&self, now: NaiveDateTime) -> usize {
        let mut slots = self.lock_slots();
        let before = slots.len();
        slots.retain(|_, slot| !self.is_reclaimable(slot, now));
        before - slots.len()
    }

    /// Sessions currently in flight.
    pub fn active_count(&self) -> usize {
        self.lock_slots()
            .values()
            .filter(|slot| match slot.try_lock() {
                Ok(session) => session.is_some(),
                Err(_) => true,
            })
            .count()
    }

    fn make_room(&self, slots: &mut HashMap<String, SessionSlot>, now: NaiveDateTime) {
        slots.retain(|_, slot| !self.is_reclaimable(slot, now));
        if slots.len() < self.capacity {
            return;
        }

        let oldest = slots
            .iter()
            .filter(|(_, slot)| Arc::strong_count(slot) == 1)
            .filter_map(|(phone, slot)| {
                let session = slot.try_lock().ok()?;
                let last_activity = session.as_ref().map(|s| s.last_activity)?;
                Some((phone.clone(), last_activity))
            })
            .min_by_key(|(_, last_activity)| *last_activity)
            .map(|(phone, _)| phone);

        match oldest {
            Some(phone) => {
                tracing::warn!(phone = %phone, "session capacity reached, evicting least recently active");
                slots.remove(&phone);
            }
            None => tracing::warn!(
                capacity = self.capacity,
                "session capacity reached with every session busy"
            ),
        }
    }

    /// Idle means only the table holds the slot, so no task is waiting on it.
    fn is_reclaimable(&self, slot: &SessionSlot, now: NaiveDateTime) -> bool {
        if Arc::strong_count(slot) > 1 {
            return false;
        }
        match slot.try_lock() {
            Ok(session) => match session.as_ref() {
                None => true,
                Some(s) => self.is_expired(s, now),
            },
            Err(_) => false,
        }
    }

    fn is_expired(&self, session: &Session, now: NaiveDateTime) -> bool {
        // A deadline past the calendar's end never arrives.
        session
            .last_activity
            .checked_add_signed(self.ttl)
            .is_some_and(|deadline| deadline <= now)
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, SessionSlot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
