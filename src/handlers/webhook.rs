use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tokio::task::JoinSet;

use crate::models::InboundMessage;
use crate::services::conversation;
use crate::state::AppState;

// GET /webhook/whatsapp
#[derive(Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

pub async fn verify_webhook(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let expected = &state.config.whatsapp_verify_token;
    let token_ok = !expected.is_empty() && query.verify_token.as_deref() == Some(expected.as_str());

    match (query.mode.as_deref(), query.challenge) {
        (Some("subscribe"), Some(challenge)) if token_ok => {
            tracing::info!("webhook verified");
            (StatusCode::OK, challenge).into_response()
        }
        _ => {
            tracing::warn!("webhook verification rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

// POST /webhook/whatsapp
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    pub value: WebhookValue,
}

#[derive(Debug, Deserialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    pub from: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub text: Option<TextBody>,
    pub interactive: Option<Interactive>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct Interactive {
    pub list_reply: Option<ListReply>,
}

#[derive(Debug, Deserialize)]
pub struct ListReply {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

impl WebhookMessage {
    fn into_inbound(self) -> (String, InboundMessage) {
        let message = if let Some(reply) = self.interactive.and_then(|i| i.list_reply) {
            InboundMessage::ListReply {
                id: reply.id,
                title: reply.title,
            }
        } else if let Some(text) = self.text {
            InboundMessage::Text(text.body)
        } else {
            InboundMessage::Unsupported(self.kind)
        };
        (self.from, message)
    }
}

fn verify_signature(app_secret: &str, signature: &str, body: &[u8]) -> bool {
    let Some(hex_sig) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Signature check is skipped when no app secret is configured (dev mode)
    if !state.config.whatsapp_app_secret.is_empty() {
        let signature = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if !verify_signature(&state.config.whatsapp_app_secret, signature, &body) {
            tracing::warn!("invalid or missing X-Hub-Signature-256");
            return (StatusCode::FORBIDDEN, "Invalid signature").into_response();
        }
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "malformed webhook payload");
            return acknowledge();
        }
    };

    // Same-phone messages stay in arrival order; phones run in parallel.
    let mut by_phone: HashMap<String, Vec<InboundMessage>> = HashMap::new();
    for message in payload
        .entry
        .into_iter()
        .flat_map(|e| e.changes)
        .flat_map(|c| c.value.messages)
    {
        let (from, inbound) = message.into_inbound();
        by_phone.entry(from).or_default().push(inbound);
    }

    let mut tasks = JoinSet::new();
    for (from, messages) in by_phone {
        let state = Arc::clone(&state);
        tasks.spawn(async move {
            for message in messages {
                handle_message(&state, &from, message).await;
            }
        });
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "message task panicked");
        }
    }

    let evicted = state.sessions.evict_expired(state.clock.now());
    if evicted > 0 {
        tracing::debug!(evicted, "expired sessions swept");
    }

    acknowledge()
}

async fn handle_message(state: &Arc<AppState>, from: &str, message: InboundMessage) {
    tracing::info!(from = %from, message = ?message, "incoming WhatsApp message");
    let replies = conversation::process_message(state, from, message).await;
    tracing::debug!(from = %from, replies = replies.len(), "replies delivered");
}

fn acknowledge() -> Response {
    Json(serde_json::json!({ "message": "EVENT_RECEIVED" })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_signature_roundtrip() {
        let body = br#"{"entry":[]}"#;
        let sig = sign("s3cret", body);
        assert!(verify_signature("s3cret", &sig, body));
        assert!(!verify_signature("other", &sig, body));
        assert!(!verify_signature("s3cret", "sha256=zz", body));
        assert!(!verify_signature("s3cret", &sig.replace("sha256=", ""), body));
    }

    #[test]
    fn test_payload_parsing() {
        let raw = r#"{
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messages": [
                            {"from": "5547999990000", "type": "text", "text": {"body": "Maria"}},
                            {"from": "5547999990000", "type": "interactive",
                             "interactive": {"type": "list_reply", "list_reply": {"id": "revisao_geral", "title": "Revisão Geral"}}},
                            {"from": "5547988880000", "type": "image", "image": {"id": "x"}}
                        ]
                    }
                }]
            }]
        }"#;
        let payload: WebhookPayload = serde_json::from_str(raw).unwrap();
        let messages: Vec<_> = payload
            .entry
            .into_iter()
            .flat_map(|e| e.changes)
            .flat_map(|c| c.value.messages)
            .map(WebhookMessage::into_inbound)
            .collect();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].1, InboundMessage::Text("Maria".to_string()));
        assert_eq!(messages[1].1.list_reply_id(), Some("revisao_geral"));
        assert_eq!(messages[2].1, InboundMessage::Unsupported("image".to_string()));
    }

    #[test]
    fn test_status_only_payload_has_no_messages() {
        let raw = r#"{"entry":[{"changes":[{"value":{"statuses":[{"id":"wamid"}]}}]}]}"#;
        let payload: WebhookPayload = serde_json::from_str(raw).unwrap();
        assert!(payload.entry[0].changes[0].value.messages.is_empty());
    }
}
