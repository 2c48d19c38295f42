use serde::{Deserialize, Serialize};

/// A bookable shop service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
}
