//! OpenAI-compatible chat completions provider.
//!
//! Works with api.openai.com and any server exposing `/chat/completions`
//! (vLLM, LM Studio, llama.cpp server).

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use prosearch_core::{AppError, AppResult};
use serde_json::{json, Value};

/// OpenAI-compatible LLM client.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client for the given base URL (e.g. "https://api.openai.com/v1").
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn request_body(request: &LlmRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(ref system) = request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": false,
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if request.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        body
    }

    fn parse_response(body: &Value, model: &str) -> AppResult<LlmResponse> {
        let choice = body
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| AppError::Llm("No choices in response".to_string()))?;

        let content = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| AppError::Llm("No message content in choice".to_string()))?;

        let usage = body
            .get("usage")
            .map(|u| {
                let field = |name: &str| u.get(name).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                LlmUsage::new(field("prompt_tokens"), field("completion_tokens"))
            })
            .unwrap_or_default();

        let finish_reason = choice.get("finish_reason").and_then(|f| f.as_str());

        Ok(LlmResponse {
            content: content.to_string(),
            model: body
                .get("model")
                .and_then(|m| m.as_str())
                .unwrap_or(model)
                .to_string(),
            usage,
            done: finish_reason != Some("length"),
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(url = %url, model = %request.model, "Sending OpenAI completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to OpenAI: {}", e)))?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(AppError::Llm(format!(
                "OpenAI API error ({}): {}",
                status, response_body
            )));
        }

        let body: Value = serde_json::from_str(&response_body)
            .map_err(|e| AppError::Llm(format!("Invalid JSON from OpenAI: {}", e)))?;

        Self::parse_response(&body, &request.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_includes_system_and_json_mode() {
        let request = LlmRequest::new("question", "gpt-4o-mini")
            .with_system("sys")
            .with_temperature(0.0)
            .with_json_mode();

        let body = OpenAiClient::request_body(&request);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "question");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["temperature"], 0.0);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_response() {
        let body = json!({
            "model": "gpt-4o-mini-2024",
            "choices": [{
                "message": {"role": "assistant", "content": "Hello"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 1}
        });

        let response = OpenAiClient::parse_response(&body, "gpt-4o-mini").unwrap();
        assert_eq!(response.content, "Hello");
        assert_eq!(response.model, "gpt-4o-mini-2024");
        assert_eq!(response.usage.total_tokens, 6);
        assert!(response.done);
    }

    #[test]
    fn test_parse_response_no_choices() {
        let body = json!({"choices": []});
        assert!(OpenAiClient::parse_response(&body, "m").is_err());
    }
}
