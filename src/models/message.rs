use serde::{Deserialize, Serialize};

/// One inbound message as far as the conversation engine cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Text(String),
    ListReply { id: String, title: String },
    /// Images, stickers, locations and anything else we cannot read.
    Unsupported(String),
}

impl InboundMessage {
    pub fn text(&self) -> Option<&str> {
        match self {
            InboundMessage::Text(body) => Some(body.trim()),
            _ => None,
        }
    }

    pub fn list_reply_id(&self) -> Option<&str> {
        match self {
            InboundMessage::ListReply { id, .. } => Some(id.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text(String),
    List(ListMenu),
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        OutboundMessage::Text(body.into())
    }

    /// Plain-text rendering, used for logs and for tests.
    pub fn preview(&self) -> String {
        match self {
            OutboundMessage::Text(body) => body.clone(),
            OutboundMessage::List(menu) => {
                let rows = menu
                    .rows
                    .iter()
                    .map(|r| r.title.as_str())
                    .collect::<Vec<_>>()
                    .join(" | ");
                format!("{}\n{}\n[{}]", menu.header, menu.body, rows)
            }
        }
    }
}

/// A single-section, single-select interactive list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMenu {
    pub header: String,
    pub body: String,
    pub footer: String,
    pub button: String,
    pub section_title: String,
    pub rows: Vec<ListRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRow {
    pub id: String,
    pub title: String,
}
