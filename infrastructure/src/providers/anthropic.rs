//! Anthropic Messages API adapter

use super::ProviderSettings;
use super::http::{ensure_success, from_reqwest};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use ultra_application::{AdapterError, Generation, ProviderAdapter};
use ultra_domain::{Capabilities, GenerationParams, TokenUsage};

const MESSAGES_PATH: &str = "/v1/messages";
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    client: reqwest::Client,
    model: String,
    settings: ProviderSettings,
}

impl AnthropicAdapter {
    pub fn new(
        client: reqwest::Client,
        model: impl Into<String>,
        settings: ProviderSettings,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            settings,
        }
    }

    fn request_body(&self, prompt: &str, params: &GenerationParams) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": params.max_tokens.unwrap_or(self.settings.max_tokens),
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(system) = params.system_prompt.as_deref() {
            body["system"] = json!(system);
        }
        if let Some(temperature) = params.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

impl std::fmt::Debug for AnthropicAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicAdapter")
            .field("model", &self.model)
            .field("settings", &self.settings)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

fn parse_response(body: &str) -> Result<Generation, AdapterError> {
    let parsed: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| AdapterError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let text: String = parsed
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .map(|block| block.text.as_str())
        .collect();
    if text.trim().is_empty() {
        return Err(AdapterError::MalformedResponse(
            "response had no text content".to_string(),
        ));
    }

    let mut generation = Generation::new(text);
    if let Some(usage) = parsed.usage {
        generation =
            generation.with_tokens(TokenUsage::new(usage.input_tokens, usage.output_tokens));
    }
    Ok(generation)
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Generation, AdapterError> {
        let key = self
            .settings
            .api_key
            .as_ref()
            .ok_or_else(|| AdapterError::Auth("no API key configured".to_string()))?;
        let url = self.settings.endpoint(MESSAGES_PATH);
        debug!(model = %self.model, "POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", key.expose())
            .header(
                "anthropic-version",
                self.settings
                    .api_version
                    .as_deref()
                    .unwrap_or(DEFAULT_API_VERSION),
            )
            .json(&self.request_body(prompt, params))
            .send()
            .await
            .map_err(from_reqwest)?;

        let body = ensure_success(response)
            .await?
            .text()
            .await
            .map_err(from_reqwest)?;
        parse_response(&body)
    }

    fn describe(&self) -> Capabilities {
        Capabilities::new(200_000)
    }
}
