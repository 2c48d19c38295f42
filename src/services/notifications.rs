use serde::Serialize;

use crate::models::{Booking, BookingStatus, OutboundMessage};
use crate::services::conversation::format_datetime_br;
use crate::services::messaging::MessagingProvider;

/// What happened to the customer notice that follows a status change. A
/// failed delivery never undoes the change itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationOutcome {
    Sent,
    Failed,
    Skipped,
}

pub fn status_notice(booking: &Booking) -> Option<String> {
    let name = booking.customer_name.as_deref().unwrap_or("cliente");
    let when = format_datetime_br(&booking.scheduled_at);
    match booking.status {
        BookingStatus::Confirmed => Some(format!(
            "✅ Olá {name}, seu agendamento para {when} foi confirmado!"
        )),
        BookingStatus::Canceled => Some(format!(
            "❌ Olá {name}, seu agendamento para {when} foi cancelado. Se precisar, entre em contato conosco."
        )),
        BookingStatus::Pending => None,
    }
}

/// Tells the customer their booking moved to `booking.status`. Only bookings
/// whose counterparty is a phone number can be reached.
pub async fn notify_status_change(
    messaging: &dyn MessagingProvider,
    booking: &Booking,
    previous: BookingStatus,
) -> NotificationOutcome {
    if booking.status == previous || !looks_like_phone(&booking.counterparty) {
        return NotificationOutcome::Skipped;
    }
    let Some(body) = status_notice(booking) else {
        return NotificationOutcome::Skipped;
    };

    match messaging
        .send(&booking.counterparty, &OutboundMessage::text(body))
        .await
    {
        Ok(()) => {
            tracing::info!(booking_id = %booking.id, status = booking.status.as_str(), "customer notified");
            NotificationOutcome::Sent
        }
        Err(e) => {
            tracing::error!(error = %e, booking_id = %booking.id, "failed to notify customer");
            NotificationOutcome::Failed
        }
    }
}

fn looks_like_phone(counterparty: &str) -> bool {
    let digits = counterparty.strip_prefix('+').unwrap_or(counterparty);
    (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDateTime;

    struct Recorder {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl MessagingProvider for Recorder {
        async fn send(&self, to: &str, message: &OutboundMessage) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("network down");
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), message.preview()));
            Ok(())
        }
    }

    fn recorder(fail: bool) -> Recorder {
        Recorder {
            sent: Mutex::new(vec![]),
            fail,
        }
    }

    fn booking(counterparty: &str, status: BookingStatus) -> Booking {
        let at = NaiveDateTime::parse_from_str("2025-06-16 10:00", "%Y-%m-%d %H:%M").unwrap();
        Booking {
            id: "b1".to_string(),
            resource_id: "oficina".to_string(),
            counterparty: counterparty.to_string(),
            customer_name: Some("Maria".to_string()),
            service: Some("Revisão Geral".to_string()),
            scheduled_at: at,
            status,
            note: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_notice_text() {
        let confirmed = status_notice(&booking("5547999990000", BookingStatus::Confirmed)).unwrap();
        assert_eq!(
            confirmed,
            "✅ Olá Maria, seu agendamento para 16/06/2025 10:00 foi confirmado!"
        );
        let canceled = status_notice(&booking("5547999990000", BookingStatus::Canceled)).unwrap();
        assert!(canceled.contains("foi cancelado"));
        assert!(status_notice(&booking("5547999990000", BookingStatus::Pending)).is_none());
    }

    #[tokio::test]
    async fn test_sends_on_change() {
        let messaging = recorder(false);
        let b = booking("5547999990000", BookingStatus::Confirmed);
        let outcome = notify_status_change(&messaging, &b, BookingStatus::Pending).await;
        assert_eq!(outcome, NotificationOutcome::Sent);
        let sent = messaging.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "5547999990000");
    }

    #[tokio::test]
    async fn test_skips_unchanged_and_non_phone() {
        let messaging = recorder(false);
        let b = booking("5547999990000", BookingStatus::Confirmed);
        assert_eq!(
            notify_status_change(&messaging, &b, BookingStatus::Confirmed).await,
            NotificationOutcome::Skipped
        );
        let ui = booking("user-42", BookingStatus::Canceled);
        assert_eq!(
            notify_status_change(&messaging, &ui, BookingStatus::Confirmed).await,
            NotificationOutcome::Skipped
        );
        assert!(messaging.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_is_reported() {
        let messaging = recorder(true);
        let b = booking("+5547999990000", BookingStatus::Canceled);
        assert_eq!(
            notify_status_change(&messaging, &b, BookingStatus::Pending).await,
            NotificationOutcome::Failed
        );
    }
}
