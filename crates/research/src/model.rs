//! Shared plumbing for the LLM-driven research steps.

use prosearch_core::{AppError, AppResult};
use prosearch_llm::{parse_json, LlmClient, LlmRequest};
use prosearch_prompt::PromptLibrary;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Renders a prompt and sends it to the configured model.
#[derive(Clone)]
pub struct ModelCaller {
    client: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    model: String,
    temperature: Option<f32>,
}

impl ModelCaller {
    pub fn new(
        client: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            prompts,
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, prompt_id: &str, variables: serde_json::Value) -> AppResult<LlmRequest> {
        let built = self.prompts.render(prompt_id, variables)?;

        let mut request = LlmRequest::new(built.user, self.model.clone());
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if built.metadata.json_output {
            request = request.with_json_mode();
        }
        Ok(request)
    }

    /// Complete a prompt and return the raw text.
    pub async fn text(&self, prompt_id: &str, variables: serde_json::Value) -> AppResult<String> {
        let request = self.request(prompt_id, variables)?;
        let response = self.client.complete(&request).await?;

        if response.content.trim().is_empty() {
            return Err(AppError::Llm(format!(
                "Empty response from {} for prompt {}",
                self.client.provider_name(),
                prompt_id
            )));
        }
        Ok(response.content)
    }

    /// Complete a JSON prompt and deserialise the object it returns.
    pub async fn json<T: DeserializeOwned>(
        &self,
        prompt_id: &str,
        variables: serde_json::Value,
    ) -> AppResult<T> {
        let raw = self.text(prompt_id, variables).await?;
        parse_json(&raw)
    }
}
