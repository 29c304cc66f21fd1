//! JSON chat components

use basalt_core::{BasaltError, Result};
use serde::{Deserialize, Serialize};

/// A text component as sent in disconnect reasons and chat
///
/// Only the fields the server emits are modelled; unknown fields from a
/// client are dropped on parse.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<ChatMessage>,
}

impl ChatMessage {
    /// Plain text component
    pub fn simple(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Default::default() }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn to_json(&self) -> String {
        // a struct of strings and bools cannot fail to serialize
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"text\":{:?}}}", self.text))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        // bare JSON strings are valid components too
        if let Ok(text) = serde_json::from_str::<String>(json) {
            return Ok(Self::simple(text));
        }
        serde_json::from_str(json)
            .map_err(|e| BasaltError::FrameCorrupt(format!("Invalid chat JSON: {}", e)))
    }
}

impl From<&str> for ChatMessage {
    fn from(text: &str) -> Self {
        Self::simple(text)
    }
}

impl From<String> for ChatMessage {
    fn from(text: String) -> Self {
        Self::simple(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_json() {
        assert_eq!(ChatMessage::simple("Bye").to_json(), r#"{"text":"Bye"}"#);
    }

    #[test]
    fn test_color_json() {
        let msg = ChatMessage::simple("Kicked").with_color("red");
        assert_eq!(msg.to_json(), r#"{"text":"Kicked","color":"red"}"#);
    }

    #[test]
    fn test_parse_string_form() {
        assert_eq!(ChatMessage::from_json(r#""hello""#).unwrap(), ChatMessage::simple("hello"));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(ChatMessage::from_json("{not json").is_err());
    }
}
