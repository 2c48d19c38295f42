use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ServiceKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CollectingName,
    AwaitingSlotChoice,
    AwaitingServiceChoice,
    AwaitingNote,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::CollectingName => "collecting_name",
            Stage::AwaitingSlotChoice => "awaiting_slot_choice",
            Stage::AwaitingServiceChoice => "awaiting_service_choice",
            Stage::AwaitingNote => "awaiting_note",
            Stage::Done => "done",
        }
    }
}

/// In-flight booking conversation for one phone number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub phone: String,
    pub stage: Stage,
    pub name: Option<String>,
    pub chosen_at: Option<NaiveDateTime>,
    pub service: Option<ServiceKind>,
    /// Instants offered in the last numbered list, 1-based on the wire.
    pub candidates: Vec<NaiveDateTime>,
    pub last_activity: NaiveDateTime,
}

impl Session {
    pub fn new(phone: &str, now: NaiveDateTime) -> Self {
        Self {
            phone: phone.to_string(),
            stage: Stage::CollectingName,
            name: None,
            chosen_at: None,
            service: None,
            candidates: Vec::new(),
            last_activity: now,
        }
    }
}
