//! Type definitions for language-model interactions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The only request shape sent to the language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// What kind of site the step runs against
    pub system_context: String,
    /// The natural-language step, verbatim
    pub step_text: String,
    /// One example per action variant plus the JSON-only instruction
    pub output_format_spec: String,
}

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Raw model reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Free text expected to contain one JSON object
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub usage: Option<Usage>,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: Utc::now(),
            usage: None,
        }
    }
}

/// Anthropic API message format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

/// Anthropic API request format
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
}

/// Anthropic API response format
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicResponse {
    #[allow(dead_code)]
    pub id: String,
    pub content: Vec<AnthropicContent>,
    pub usage: Option<Usage>,
}

/// Content block in Anthropic response
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_missing_system() {
        let request = AnthropicRequest {
            model: "m".to_string(),
            max_tokens: 300,
            temperature: 0.2,
            system: None,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_parses_text_blocks() {
        let response: AnthropicResponse = serde_json::from_str(
            r#"{
                "id": "msg_1",
                "content": [{"type": "text", "text": "{\"action\": \"view\"}"}],
                "usage": {"input_tokens": 120, "output_tokens": 9}
            }"#,
        )
        .unwrap();
        assert_eq!(response.content[0].content_type, "text");
        assert_eq!(response.usage.unwrap().output_tokens, 9);
    }
}
