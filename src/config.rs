use std::env;

use chrono::Duration;
use chrono_tz::Tz;

use crate::models::SlotCatalog;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub whatsapp_phone_number_id: String,
    pub whatsapp_access_token: String,
    pub whatsapp_verify_token: String,
    /// Meta app secret; when empty, webhook signatures are not checked (dev mode).
    pub whatsapp_app_secret: String,
    pub whatsapp_timeout_secs: u64,
    pub shop_timezone: Tz,
    pub bot_resource_id: String,
    pub bot_days_ahead: u32,
    pub session_ttl_minutes: i64,
    pub session_capacity: usize,
    pub ui_slots: SlotCatalog,
    pub bot_slots: SlotCatalog,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let shop_timezone = env::var("SHOP_TIMEZONE")
            .unwrap_or_else(|_| "America/Sao_Paulo".to_string())
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid SHOP_TIMEZONE: {e}"))?;

        let ui_slots = slot_catalog_or("SLOT_TIMES_UI", SlotCatalog::booking_ui)?;
        let bot_slots = slot_catalog_or("SLOT_TIMES_BOT", SlotCatalog::whatsapp)?;

        let config = Self {
            port: parse_or("PORT", 3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "bikeshop.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_default(),
            whatsapp_phone_number_id: env::var("WHATSAPP_PHONE_NUMBER_ID").unwrap_or_default(),
            whatsapp_access_token: env::var("WHATSAPP_ACCESS_TOKEN").unwrap_or_default(),
            whatsapp_verify_token: env::var("WHATSAPP_VERIFY_TOKEN").unwrap_or_default(),
            whatsapp_app_secret: env::var("WHATSAPP_APP_SECRET").unwrap_or_default(),
            whatsapp_timeout_secs: parse_or("WHATSAPP_TIMEOUT_SECS", 10),
            shop_timezone,
            bot_resource_id: env::var("BOT_RESOURCE_ID").unwrap_or_else(|_| "oficina".to_string()),
            bot_days_ahead: parse_or("BOT_DAYS_AHEAD", 3),
            session_ttl_minutes: parse_or("SESSION_TTL_MINUTES", 30),
            session_capacity: parse_or("SESSION_CAPACITY", 10_000),
            ui_slots,
            bot_slots,
        };
        config.session_ttl()?;
        Ok(config)
    }

    /// Session inactivity timeout; must be positive and fit in a `Duration`.
    pub fn session_ttl(&self) -> anyhow::Result<Duration> {
        session_ttl_from_minutes(self.session_ttl_minutes)
    }
}

fn session_ttl_from_minutes(minutes: i64) -> anyhow::Result<Duration> {
    if minutes <= 0 {
        anyhow::bail!("invalid SESSION_TTL_MINUTES: must be positive, got {minutes}");
    }
    Duration::try_minutes(minutes)
        .ok_or_else(|| anyhow::anyhow!("invalid SESSION_TTL_MINUTES: {minutes} is out of range"))
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Accepts either `09:00,10:00` or a JSON array such as `["09:00","10:00"]`.
fn slot_catalog_or(key: &str, default: fn() -> SlotCatalog) -> anyhow::Result<SlotCatalog> {
    let Ok(raw) = env::var(key) else {
        return Ok(default());
    };
    let catalog = if raw.trim_start().starts_with('[') {
        SlotCatalog::from_json(&raw)
    } else {
        SlotCatalog::parse(&raw)
    };
    catalog.map_err(|e| anyhow::anyhow!("invalid {key}: {e}"))
}
