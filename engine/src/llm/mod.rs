//! LLM Provider Abstraction Layer
//!
//! This module provides the single capability boundary the workflow
//! depends on: turning a list of conversation messages into raw model
//! text. The `LLMProvider` trait defines that contract; the `gemini`
//! submodule implements it over the Gemini REST API. JSON extraction
//! helpers live here because every generator needs to dig a JSON payload
//! out of loosely formatted model output.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod gemini;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,

    /// Assistant message
    Assistant,

    /// System message
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "gemini")
    fn name(&self) -> &str;

    /// Generate raw text from the conversation messages.
    ///
    /// # Arguments
    /// * `messages` - System instructions plus conversation turns
    ///
    /// # Returns
    /// * `Ok(String)` - Raw model output, possibly prose-wrapped JSON
    /// * `Err(LLMError)` - If the request fails
    async fn generate(&self, messages: &[Message]) -> Result<String>;

    /// Check if the provider is currently healthy and available.
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Extract the first JSON object from loosely formatted model output.
///
/// Handles the formats models actually produce:
/// 1. The whole output is the object
/// 2. Fenced JSON (with or without trailing prose): ` ```json\n{...}\n``` `
/// 3. An object embedded in prose — scans for the first `{` and takes
///    the balanced slice
pub fn extract_json_object(content: &str) -> Option<&str> {
    let trimmed = content.trim();

    if trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Some(trimmed);
    }

    if let Some(inner) = extract_fenced_block(trimmed) {
        let inner = inner.trim();
        if serde_json::from_str::<serde_json::Value>(inner).is_ok() {
            return Some(inner);
        }
    }

    if let Some(pos) = trimmed.find('{') {
        if let Some(candidate) = take_balanced_object(&trimmed[pos..]) {
            if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                return Some(candidate);
            }
        }
    }

    None
}

/// Extract and deserialize a JSON payload of type `T` from model output
pub fn parse_json_payload<T: DeserializeOwned>(content: &str) -> Option<T> {
    let raw = extract_json_object(content)?;
    serde_json::from_str(raw).ok()
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
fn extract_fenced_block(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Take a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
fn take_balanced_object(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let user_msg = Message::user("Hello");
        assert_eq!(user_msg.role, MessageRole::User);
        assert_eq!(user_msg.content, "Hello");

        let assistant_msg = Message::assistant("Hi there");
        assert_eq!(assistant_msg.role, MessageRole::Assistant);

        let system_msg = Message::system("You are a helpful assistant");
        assert_eq!(system_msg.role, MessageRole::System);
    }

    #[test]
    fn test_message_serialization() {
        let msg = Message::user("test");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""role":"user""#));
        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, deserialized);
    }

    #[test]
    fn test_extract_whole_object() {
        let raw = r#"{"intent": "dua"}"#;
        assert_eq!(extract_json_object(raw), Some(raw));
    }

    #[test]
    fn test_extract_fenced_object() {
        let raw = "Sure, here you go:\n```json\n{\"intent\": \"video_list\"}\n```\nLet me know!";
        assert_eq!(extract_json_object(raw), Some("{\"intent\": \"video_list\"}"));
    }

    #[test]
    fn test_extract_embedded_object() {
        let raw = r#"The classification is {"intent": "companion_answer"} as requested."#;
        assert_eq!(
            extract_json_object(raw),
            Some(r#"{"intent": "companion_answer"}"#)
        );
    }

    #[test]
    fn test_extract_nested_object() {
        let raw = r#"prefix {"a": {"b": "}"}, "c": 1} suffix"#;
        assert_eq!(extract_json_object(raw), Some(r#"{"a": {"b": "}"}, "c": 1}"#));
    }

    #[test]
    fn test_extract_none_for_plain_prose() {
        assert_eq!(extract_json_object("no json here at all"), None);
        assert_eq!(extract_json_object("broken { json"), None);
    }

    #[test]
    fn test_parse_json_payload() {
        #[derive(serde::Deserialize)]
        struct Label {
            intent: String,
        }

        let parsed: Option<Label> = parse_json_payload("```json\n{\"intent\": \"dua\"}\n```");
        assert_eq!(parsed.unwrap().intent, "dua");

        let none: Option<Label> = parse_json_payload("nothing structured");
        assert!(none.is_none());
    }
}
