use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub resource_id: String,
    pub counterparty: String,
    pub customer_name: Option<String>,
    pub service: Option<String>,
    pub scheduled_at: NaiveDateTime,
    pub status: BookingStatus,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    pub fn display_status(&self, now: NaiveDateTime) -> DisplayStatus {
        self.status.display(self.scheduled_at, now)
    }
}

/// Fields supplied by a caller when creating a booking. Identity and
/// timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub resource_id: String,
    pub counterparty: String,
    pub customer_name: Option<String>,
    pub service: Option<String>,
    pub scheduled_at: NaiveDateTime,
    pub status: BookingStatus,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Canceled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Canceled => "canceled",
        }
    }

    /// Accepts both the stored lowercase form and the uppercase API form.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "canceled" | "cancelled" => Some(BookingStatus::Canceled),
            _ => None,
        }
    }

    /// Status only moves forward. Re-applying the current status is allowed.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        match (self, next) {
            (a, b) if *a == b => true,
            (Pending, Confirmed) | (Pending, Canceled) | (Confirmed, Canceled) => true,
            _ => false,
        }
    }

    pub fn display(&self, scheduled_at: NaiveDateTime, now: NaiveDateTime) -> DisplayStatus {
        match self {
            BookingStatus::Pending => DisplayStatus::Pending,
            BookingStatus::Confirmed if scheduled_at < now => DisplayStatus::Concluded,
            BookingStatus::Confirmed => DisplayStatus::Confirmed,
            BookingStatus::Canceled => DisplayStatus::Canceled,
        }
    }
}

/// What a user sees. `Concluded` is never stored.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayStatus {
    Pending,
    Confirmed,
    Concluded,
    Canceled,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_parse_accepts_api_and_db_forms() {
        assert_eq!(BookingStatus::parse("CONFIRMED"), Some(BookingStatus::Confirmed));
        assert_eq!(BookingStatus::parse("pending"), Some(BookingStatus::Pending));
        assert_eq!(BookingStatus::parse("CANCELED"), Some(BookingStatus::Canceled));
        assert_eq!(BookingStatus::parse("done"), None);
    }

    #[test]
    fn test_transitions_are_one_directional() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Canceled));
        assert!(Confirmed.can_transition_to(Canceled));
        assert!(Confirmed.can_transition_to(Confirmed));
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Canceled.can_transition_to(Pending));
        assert!(!Canceled.can_transition_to(Confirmed));
    }

    #[test]
    fn test_concluded_is_derived_from_past_confirmed() {
        let now = dt("2025-06-16 12:00");
        let past = dt("2025-06-16 10:00");
        let future = dt("2025-06-16 14:00");

        assert_eq!(BookingStatus::Confirmed.display(past, now), DisplayStatus::Concluded);
        assert_eq!(BookingStatus::Confirmed.display(future, now), DisplayStatus::Confirmed);
        assert_eq!(BookingStatus::Pending.display(past, now), DisplayStatus::Pending);
        assert_eq!(BookingStatus::Canceled.display(past, now), DisplayStatus::Canceled);
    }

    #[test]
    fn test_serializes_uppercase() {
        let json = serde_json::to_string(&BookingStatus::Confirmed).unwrap();
        assert_eq!(json, "\"CONFIRMED\"");
    }
}
