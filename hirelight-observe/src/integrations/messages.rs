//! Chat message shapes accepted by the adapters.
//!
//! Providers disagree on how a message looks: content may be a string, a
//! list of multimodal parts, or something else entirely; a choice may carry
//! a full message, a streaming delta, or bare text. Each variant is resolved
//! here by serde so the adapters only ever see one shape.

use serde::{Deserialize, Serialize};

use crate::types::TokenUsage;
use crate::value::json_to_text;

/// One chat message, as sent in a request or returned in a choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    /// Function name on function-result messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            content: Some(MessageContent::Text(content.into())),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.role.is_none()
            && self.content.is_none()
            && self.name.is_none()
            && self.function_call.is_none()
            && self.tool_calls.is_none()
    }

    /// Content as plain text; missing content is empty.
    pub fn text(&self) -> String {
        self.content
            .as_ref()
            .map(MessageContent::to_text)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Other(serde_json::Value),
}

impl MessageContent {
    /// Text parts are joined with newlines; non-text parts are dropped.
    pub fn to_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(ContentPart::text)
                .collect::<Vec<_>>()
                .join("\n"),
            MessageContent::Other(value) => json_to_text(value.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text(String),
    Object(PartObject),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartObject {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentPart {
    pub fn text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(text) => Some(text),
            ContentPart::Object(part) => match (&part.text, part.kind.as_deref()) {
                (Some(text), _) => Some(text),
                (None, Some("text")) => Some(""),
                (None, _) => None,
            },
            ContentPart::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub name: String,
    /// Usually a JSON-encoded string, occasionally an object.
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl FunctionCall {
    pub fn arguments_text(&self) -> String {
        match &self.arguments {
            serde_json::Value::Null => String::new(),
            other => json_to_text(other.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionCall>,
}

/// One entry of a response's `choices`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<ChatMessage>,
    /// Legacy text-completion output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// What a choice actually carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChoiceContent<'a> {
    Message(&'a ChatMessage),
    Text(&'a str),
}

impl Choice {
    /// The message, else the streaming delta, else the bare text.
    pub fn content(&self) -> Option<ChoiceContent<'_>> {
        fn non_empty(message: &Option<ChatMessage>) -> Option<&ChatMessage> {
            message.as_ref().filter(|m| !m.is_empty())
        }
        non_empty(&self.message)
            .or_else(|| non_empty(&self.delta))
            .map(ChoiceContent::Message)
            .or_else(|| self.text.as_deref().map(ChoiceContent::Text))
    }

    /// Text of a streaming chunk: delta content, else bare text.
    pub fn delta_text(&self) -> Option<String> {
        self.delta
            .as_ref()
            .map(ChatMessage::text)
            .filter(|text| !text.is_empty())
            .or_else(|| self.text.clone().filter(|text| !text.is_empty()))
    }
}

/// A completion or embedding response, or one streaming chunk of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn multimodal_parts_join_text() {
        let message: ChatMessage = serde_json::from_value(json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "describe this"},
                {"type": "image_url", "image_url": {"url": "https://x/cat.png"}},
                "and be brief",
                {"type": "text"}
            ]
        }))
        .unwrap();
        assert_eq!(message.text(), "describe this\nand be brief\n");
    }

    #[test]
    fn odd_content_falls_back_to_json() {
        let message: ChatMessage =
            serde_json::from_value(json!({"role": "tool", "content": 42})).unwrap();
        assert_eq!(message.text(), "42");

        let message: ChatMessage =
            serde_json::from_value(json!({"role": "assistant", "content": null})).unwrap();
        assert_eq!(message.text(), "");
    }

    #[test]
    fn tool_calls_and_function_arguments() {
        let message: ChatMessage = serde_json::from_value(json!({
            "role": "assistant",
            "function_call": {"name": "lookup", "arguments": {"id": 7}},
            "tool_calls": [
                {"id": "call_1", "type": "function",
                 "function": {"name": "search", "arguments": "{\"q\":\"rust\"}"}}
            ]
        }))
        .unwrap();
        let call = message.function_call.as_ref().unwrap();
        assert_eq!(call.arguments_text(), r#"{"id":7}"#);
        let tool = &message.tool_calls.as_ref().unwrap()[0];
        assert_eq!(tool.kind, "function");
        assert_eq!(
            tool.function.as_ref().unwrap().arguments_text(),
            r#"{"q":"rust"}"#
        );
    }

    #[test]
    fn choice_prefers_message_then_delta_then_text() {
        let choice: Choice = serde_json::from_value(json!({
            "message": {},
            "delta": {"content": "partial"},
            "text": "legacy"
        }))
        .unwrap();
        assert!(matches!(
            choice.content(),
            Some(ChoiceContent::Message(m)) if m.text() == "partial"
        ));

        let legacy: Choice = serde_json::from_value(json!({"text": "legacy"})).unwrap();
        assert_eq!(legacy.content(), Some(ChoiceContent::Text("legacy")));
        assert_eq!(legacy.delta_text().as_deref(), Some("legacy"));

        assert_eq!(Choice::default().content(), None);
    }

    #[test]
    fn full_message_wins_over_delta() {
        let response: ModelResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {"role": "assistant", "content": "final"},
                "delta": {"content": "partial"}
            }]
        }))
        .unwrap();
        let texts: Vec<String> = response
            .choices
            .iter()
            .filter_map(Choice::content)
            .map(|content| match content {
                ChoiceContent::Message(m) => m.text(),
                ChoiceContent::Text(t) => t.to_string(),
            })
            .collect();
        assert_eq!(texts, ["final"]);
    }
}
