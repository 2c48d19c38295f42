use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use bikeshop::clock::ShopClock;
use bikeshop::config::AppConfig;
use bikeshop::db;
use bikeshop::routes::build_router;
use bikeshop::services::messaging::whatsapp::WhatsAppProvider;
use bikeshop::services::sessions::SessionStore;
use bikeshop::services::store::SqliteBookingStore;
use bikeshop::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;

    let conn = db::init_db(&config.database_url)?;
    let store = SqliteBookingStore::new(Arc::new(Mutex::new(conn)));

    if config.whatsapp_access_token.is_empty() || config.whatsapp_phone_number_id.is_empty() {
        tracing::warn!("WhatsApp credentials not set, outbound messages will fail");
    }
    if config.admin_token.is_empty() {
        tracing::warn!("ADMIN_TOKEN not set, admin API is locked");
    }
    let messaging = WhatsAppProvider::new(
        config.whatsapp_phone_number_id.clone(),
        config.whatsapp_access_token.clone(),
        Duration::from_secs(config.whatsapp_timeout_secs),
    )?;

    let sessions = SessionStore::new(config.session_ttl()?, config.session_capacity);

    tracing::info!(
        timezone = %config.shop_timezone,
        bot_resource = %config.bot_resource_id,
        ui_slots = %config.ui_slots.to_human_readable(),
        bot_slots = %config.bot_slots.to_human_readable(),
        "booking schedule loaded"
    );

    let state = Arc::new(AppState {
        store: Arc::new(store),
        messaging: Box::new(messaging),
        sessions,
        clock: Arc::new(ShopClock::new(config.shop_timezone)),
        config: config.clone(),
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
