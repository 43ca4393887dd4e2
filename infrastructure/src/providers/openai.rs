//! OpenAI-compatible chat completions adapter
//!
//! Works against any `/v1/chat/completions` endpoint (OpenAI, OpenRouter,
//! Groq, vLLM, ...) selected through `base_url`.

use super::ProviderSettings;
use super::http::{LineBuffer, SseLine, ensure_success, from_reqwest, parse_sse_line};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;
use ultra_application::{AdapterError, Generation, ProviderAdapter, StreamHandle};
use ultra_domain::{Capabilities, GenerationParams, StreamEvent, TokenUsage};

const CHAT_PATH: &str = "/v1/chat/completions";
const STREAM_BUFFER: usize = 64;

pub struct OpenAiAdapter {
    client: reqwest::Client,
    model: String,
    settings: ProviderSettings,
}

impl OpenAiAdapter {
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

    fn request_body(&self, prompt: &str, params: &GenerationParams, stream: bool) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = params.system_prompt.as_deref() {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": params.max_tokens.unwrap_or(self.settings.max_tokens),
            "stream": stream,
        });
        if let Some(temperature) = params.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    async fn send(
        &self,
        prompt: &str,
        params: &GenerationParams,
        stream: bool,
    ) -> Result<reqwest::Response, AdapterError> {
        let url = self.settings.endpoint(CHAT_PATH);
        debug!(model = %self.model, stream, "POST {}", url);

        let mut request = self
            .client
            .post(&url)
            .json(&self.request_body(prompt, params, stream));
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key.expose());
        }

        let response = request.send().await.map_err(from_reqwest)?;
        ensure_success(response).await
    }
}

impl std::fmt::Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("model", &self.model)
            .field("settings", &self.settings)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

fn parse_response(body: &str) -> Result<Generation, AdapterError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| AdapterError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AdapterError::MalformedResponse("response had no content".to_string()))?;

    let mut generation = Generation::new(text);
    if let Some(usage) = parsed.usage {
        generation = generation.with_tokens(TokenUsage::new(
            usage.prompt_tokens,
            usage.completion_tokens,
        ));
    }
    Ok(generation)
}

/// Text delta carried by one SSE `data:` payload
fn parse_stream_chunk(data: &str) -> Result<Option<String>, AdapterError> {
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| AdapterError::MalformedResponse(format!("invalid stream chunk: {}", e)))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|t| !t.is_empty()))
}

async fn pump_sse(response: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
    let mut bytes = response.bytes_stream();
    let mut lines = LineBuffer::new();
    let mut full_text = String::new();

    while let Some(chunk) = bytes.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.send(StreamEvent::Error(from_reqwest(e).to_string())).await;
                return;
            }
        };
        let batch = match lines.push(&chunk) {
            Ok(batch) => batch,
            Err(e) => {
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                return;
            }
        };
        for line in batch {
            match parse_sse_line(&line) {
                Some(SseLine::Done) => {
                    let _ = tx.send(StreamEvent::Completed(full_text)).await;
                    return;
                }
                Some(SseLine::Data(data)) => match parse_stream_chunk(data) {
                    Ok(Some(delta)) => {
                        full_text.push_str(&delta);
                        if tx.send(StreamEvent::Delta(delta)).await.is_err() {
                            // receiver dropped
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                        return;
                    }
                },
                None => {}
            }
        }
    }

    let last = if full_text.is_empty() {
        StreamEvent::Error("stream ended without output".to_string())
    } else {
        StreamEvent::Completed(full_text)
    };
    let _ = tx.send(last).await;
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Generation, AdapterError> {
        let response = self.send(prompt, params, false).await?;
        let body = response.text().await.map_err(from_reqwest)?;
        parse_response(&body)
    }

    async fn stream_generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<StreamHandle, AdapterError> {
        let response = self.send(prompt, params, true).await?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(pump_sse(response, tx));
        Ok(StreamHandle::new(rx))
    }

    fn describe(&self) -> Capabilities {
        Capabilities::new(128_000).with_streaming()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ApiKey;
    use ultra_domain::ProviderErrorKind;

    fn adapter() -> OpenAiAdapter {
        OpenAiAdapter::new(
            reqwest::Client::new(),
            "gpt-4o",
            ProviderSettings::new("https://api.openai.com")
                .with_api_key(ApiKey::new("sk-test-0123456789abcdef"))
                .with_max_tokens(1024),
        )
    }

    #[test]
    fn test_request_body_includes_system_prompt() {
        let params = GenerationParams::default()
            .with_system_prompt("be brief")
            .with_temperature(0.5);
        let body = adapter().request_body("Define entropy", &params, false);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be brief");
        assert_eq!(body["messages"][1]["content"], "Define entropy");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn test_request_body_without_system_prompt() {
        let params = GenerationParams::default().with_max_tokens(7);
        let body = adapter().request_body("hi", &params, true);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["max_tokens"], 7);
        assert!(body.get("temperature").is_none());
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Entropy measures disorder."}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
        }"#;
        let generation = parse_response(body).unwrap();
        assert_eq!(generation.text, "Entropy measures disorder.");
        assert_eq!(generation.tokens_used, Some(TokenUsage::new(12, 5)));
    }

    #[test]
    fn test_parse_response_rejects_empty_and_garbage() {
        let empty = parse_response(r#"{"choices": [{"message": {"content": "  "}}]}"#);
        assert_eq!(
            empty.unwrap_err().kind(),
            ProviderErrorKind::MalformedResponse
        );
        let none = parse_response(r#"{"choices": []}"#);
        assert_eq!(none.unwrap_err().kind(), ProviderErrorKind::MalformedResponse);
        let garbage = parse_response("<html>bad gateway</html>");
        assert_eq!(
            garbage.unwrap_err().kind(),
            ProviderErrorKind::MalformedResponse
        );
    }

    #[test]
    fn test_parse_stream_chunk() {
        assert_eq!(
            parse_stream_chunk(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#).unwrap(),
            Some("Hel".to_string())
        );
        assert_eq!(
            parse_stream_chunk(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(),
            None
        );
        assert!(parse_stream_chunk("not json").is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", adapter());
        assert!(!debug.contains("0123456789"));
    }

    #[test]
    fn test_describe_streams() {
        assert!(adapter().describe().supports_streaming);
    }
}
