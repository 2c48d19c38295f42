use std::sync::Arc;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::services::messaging::MessagingProvider;
use crate::services::sessions::SessionStore;
use crate::services::store::BookingStore;

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn BookingStore>,
    pub messaging: Box<dyn MessagingProvider>,
    pub sessions: SessionStore,
    pub clock: Arc<dyn Clock>,
}
