//! Gemini provider
//!
//! Calls the `generateContent` endpoint. System messages map to the
//! `systemInstruction` field; assistant turns map to the "model" role.

use super::{LLMError, LLMProvider, Message, MessageRole};
use crate::config::GeminiConfig;
use async_trait::async_trait;
use serde_json::json;

pub struct GeminiProvider {
    config: GeminiConfig,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig, api_key: impl Into<String>) -> Self {
        Self {
            config,
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn check_health(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(&self, messages: &[Message]) -> super::Result<String> {
        if self.api_key.is_empty() {
            return Err(LLMError::AuthenticationFailed(
                "no API key configured".to_string(),
            ));
        }

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.api_key
        );

        let mut contents = Vec::new();
        let mut system_instruction = None;

        for msg in messages {
            if msg.role == MessageRole::System {
                system_instruction = Some(json!({
                    "parts": [{"text": msg.content}]
                }));
                continue;
            }

            contents.push(json!({
                "role": if msg.role == MessageRole::Assistant { "model" } else { "user" },
                "parts": [{"text": msg.content}]
            }));
        }

        let mut payload = serde_json::Map::new();
        payload.insert("contents".to_string(), json!(contents));
        payload.insert(
            "generationConfig".to_string(),
            json!({ "temperature": self.config.temperature }),
        );

        if let Some(sys) = system_instruction {
            payload.insert("systemInstruction".to_string(), sys);
        }

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                400 | 404 => LLMError::InvalidRequest(text),
                429 => LLMError::RateLimitExceeded,
                401 | 403 => LLMError::AuthenticationFailed(text),
                _ => LLMError::ProviderUnavailable(format!(
                    "Gemini API error ({}): {}",
                    status, text
                )),
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let candidate = data
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| LLMError::ParseError("No candidates in response".to_string()))?;

        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .ok_or_else(|| LLMError::ParseError("No parts in candidate content".to_string()))?;

        let mut full_text = String::new();
        for part in parts {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                full_text.push_str(text);
            }
        }

        Ok(full_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> GeminiProvider {
        let config = GeminiConfig {
            base_url: server.uri(),
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.3,
            api_key_env: "GEMINI_API_KEY".to_string(),
        };
        GeminiProvider::new(config, "test-key")
    }

    #[tokio::test]
    async fn test_generate_concatenates_parts() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path_regex(r"^/models/.*:generateContent$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {
                        "parts": [{"text": "{\"intent\": "}, {"text": "\"dua\"}"}]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let out = provider
            .generate(&[Message::system("classify"), Message::user("a dua please")])
            .await
            .unwrap();

        assert_eq!(out, "{\"intent\": \"dua\"}");
    }

    #[tokio::test]
    async fn test_generate_maps_status_codes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider.generate(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LLMError::RateLimitExceeded));
    }

    #[tokio::test]
    async fn test_generate_rejects_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider.generate(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LLMError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_fast() {
        let config = GeminiConfig::default();
        let provider = GeminiProvider::new(config, "");
        assert!(!provider.check_health().await);
        let err = provider.generate(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LLMError::AuthenticationFailed(_)));
    }
}
