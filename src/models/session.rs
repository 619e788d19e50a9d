use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::dialogflow::Context;

/// Where the conversation stands, decoded from the active `await-*` context.
/// The platform owns the session; this service only reads the contexts it
/// set on the previous turn and echoes updated ones back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    CollectingName,
    CollectingEmail,
    CollectingDateTime,
    ConfirmingSlot,
    ChoosingNote,
    CollectingNote,
    ConfirmingBooking,
    ConfirmingReschedule,
}

impl FlowState {
    pub fn context_name(self) -> &'static str {
        match self {
            FlowState::CollectingName => "await-name",
            FlowState::CollectingEmail => "await-email",
            FlowState::CollectingDateTime => "await-date-time",
            FlowState::ConfirmingSlot => "await-slot-confirmation",
            FlowState::ChoosingNote => "await-note-action",
            FlowState::CollectingNote => "await-note",
            FlowState::ConfirmingBooking => "await-confirmation",
            FlowState::ConfirmingReschedule => "await-reschedule-confirmation",
        }
    }

    pub fn from_context_name(name: &str) -> Option<Self> {
        match name {
            "await-name" => Some(FlowState::CollectingName),
            "await-email" => Some(FlowState::CollectingEmail),
            "await-date-time" => Some(FlowState::CollectingDateTime),
            "await-slot-confirmation" => Some(FlowState::ConfirmingSlot),
            "await-note-action" => Some(FlowState::ChoosingNote),
            "await-note" => Some(FlowState::CollectingNote),
            "await-confirmation" => Some(FlowState::ConfirmingBooking),
            "await-reschedule-confirmation" => Some(FlowState::ConfirmingReschedule),
            _ => None,
        }
    }

    /// The active step context, if any. `None` means no scheduling flow is
    /// in progress and unmatched input belongs to the FAQ path.
    pub fn from_contexts(contexts: &[Context]) -> Option<Self> {
        contexts
            .iter()
            .filter(|c| c.lifespan_count > 0)
            .find_map(|c| Self::from_context_name(c.short_name()))
    }
}

/// Slot-filling field still outstanding, in collection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingField {
    Name,
    Email,
    DateTime,
}

impl MissingField {
    pub fn label(self) -> &'static str {
        match self {
            MissingField::Name => "name",
            MissingField::Email => "email",
            MissingField::DateTime => "date and time",
        }
    }

    pub fn reprompt_state(self) -> FlowState {
        match self {
            MissingField::Name => FlowState::CollectingName,
            MissingField::Email => FlowState::CollectingEmail,
            MissingField::DateTime => FlowState::CollectingDateTime,
        }
    }
}

/// Parameters carried in the `session-parameters` context across turns.
/// Everything is a string on the wire; empty means not collected yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionParams {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub date_time: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub suggested_time: String,
    #[serde(default)]
    pub intent: String,
}

impl SessionParams {
    pub fn from_contexts(contexts: &[Context]) -> Self {
        contexts
            .iter()
            .find(|c| c.short_name() == "session-parameters")
            .and_then(|c| {
                serde_json::from_value(Value::Object(c.parameters.clone())).ok()
            })
            .unwrap_or_default()
    }

    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn first_missing(&self) -> Option<MissingField> {
        if self.name.is_empty() {
            Some(MissingField::Name)
        } else if self.email.is_empty() {
            Some(MissingField::Email)
        } else if self.date_time.is_empty() {
            Some(MissingField::DateTime)
        } else {
            None
        }
    }
}
