use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::MessagingProvider;
use crate::models::{ListMenu, OutboundMessage};

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v18.0";

/// WhatsApp Business Cloud API sender.
pub struct WhatsAppProvider {
    phone_number_id: String,
    access_token: String,
    base_url: String,
    client: reqwest::Client,
}

impl WhatsAppProvider {
    pub fn new(phone_number_id: String, access_token: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build WhatsApp HTTP client")?;
        Ok(Self {
            phone_number_id,
            access_token,
            base_url: GRAPH_API_BASE.to_string(),
            client,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.base_url, self.phone_number_id)
    }
}

#[async_trait]
impl MessagingProvider for WhatsAppProvider {
    async fn send(&self, to: &str, message: &OutboundMessage) -> anyhow::Result<()> {
        let payload = build_payload(to, message);

        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .context("failed to send WhatsApp message")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("WhatsApp API returned {status}: {body}");
        }

        Ok(())
    }
}

pub fn build_payload(to: &str, message: &OutboundMessage) -> Value {
    match message {
        OutboundMessage::Text(body) => json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": body },
        }),
        OutboundMessage::List(menu) => json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "interactive",
            "interactive": list_interactive(menu),
        }),
    }
}

fn list_interactive(menu: &ListMenu) -> Value {
    let rows: Vec<Value> = menu
        .rows
        .iter()
        .map(|row| json!({ "id": row.id, "title": row.title, "description": "" }))
        .collect();

    json!({
        "type": "list",
        "header": { "type": "text", "text": menu.header },
        "body": { "text": menu.body },
        "footer": { "text": menu.footer },
        "action": {
            "button": menu.button,
            "sections": [{ "title": menu.section_title, "rows": rows }],
        },
    })
}
