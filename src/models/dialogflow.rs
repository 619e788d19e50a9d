use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::session::{FlowState, SessionParams};

/// Fulfillment request as delivered by the conversational platform.
/// Only the fields this service reads are modeled; everything else in the
/// payload is ignored on deserialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    pub session: String,
    pub query_result: QueryResult,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub query_text: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub output_contexts: Vec<Context>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub name: String,
    #[serde(default)]
    pub lifespan_count: i32,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

impl Context {
    /// The context name without the `projects/.../contexts/` prefix.
    pub fn short_name(&self) -> &str {
        self.name
            .rsplit_once("/contexts/")
            .map(|(_, tail)| tail)
            .unwrap_or(&self.name)
    }
}

impl WebhookRequest {
    /// Platform sessions look like `projects/<p>/agent/sessions/<s>`.
    pub fn has_valid_session(&self) -> bool {
        self.session.starts_with("projects/") && self.session.contains("/sessions/")
    }

    /// String parameter extracted by the platform's entity recognition,
    /// falling back to the raw utterance when absent.
    pub fn param_or_query_text(&self, key: &str) -> String {
        let from_param = self.query_result.parameters.get(key).and_then(param_as_str);
        match from_param {
            Some(s) if !s.is_empty() => s,
            _ => self.query_result.query_text.trim().to_string(),
        }
    }
}

/// Date-time parameters arrive either as a plain string, or as a list whose
/// first element is a string or a `{"date_time": "..."}` object.
pub fn param_as_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Array(items) => items.first().and_then(param_as_str),
        Value::Object(map) => map.get("date_time").and_then(param_as_str),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub fulfillment_messages: Vec<FulfillmentMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output_contexts: Vec<Context>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FulfillmentMessage {
    Text { text: TextBlock },
    Payload { payload: Value },
}

#[derive(Debug, Clone, Serialize)]
pub struct TextBlock {
    pub text: Vec<String>,
}

impl FulfillmentMessage {
    pub fn text(message: impl Into<String>) -> Self {
        FulfillmentMessage::Text {
            text: TextBlock { text: vec![message.into()] },
        }
    }

    /// Quick-reply chips in the platform's rich content schema.
    pub fn chips(options: &[&str]) -> Self {
        let options: Vec<Value> = options
            .iter()
            .map(|o| serde_json::json!({ "text": o }))
            .collect();
        FulfillmentMessage::Payload {
            payload: serde_json::json!({
                "richContent": [[ { "type": "chips", "options": options } ]]
            }),
        }
    }
}

impl WebhookResponse {
    pub fn text(messages: Vec<String>, output_contexts: Vec<Context>) -> Self {
        Self {
            fulfillment_messages: messages.into_iter().map(FulfillmentMessage::text).collect(),
            output_contexts,
        }
    }

    pub fn with_chips(
        messages: Vec<String>,
        chips: &[&str],
        output_contexts: Vec<Context>,
    ) -> Self {
        let mut resp = Self::text(messages, output_contexts);
        resp.fulfillment_messages.push(FulfillmentMessage::chips(chips));
        resp
    }
}

/// Contexts for the next turn: the expected step with a one-turn lifespan,
/// plus the session parameters carried across the whole conversation.
pub fn build_contexts(session: &str, next: FlowState, params: &SessionParams) -> Vec<Context> {
    vec![
        Context {
            name: format!("{session}/contexts/{}", next.context_name()),
            lifespan_count: 1,
            parameters: Map::new(),
        },
        Context {
            name: format!("{session}/contexts/session-parameters"),
            lifespan_count: 99,
            parameters: params.to_map(),
        },
    ]
}
