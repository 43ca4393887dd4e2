//! Ollama local runner adapter (`/api/generate`)

use super::ProviderSettings;
use super::http::{LineBuffer, ensure_success, from_reqwest};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;
use ultra_application::{AdapterError, Generation, ProviderAdapter, StreamHandle};
use ultra_domain::{Capabilities, GenerationParams, StreamEvent, TokenUsage};

const GENERATE_PATH: &str = "/api/generate";
const STREAM_BUFFER: usize = 64;
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug)]
pub struct OllamaAdapter {
    client: reqwest::Client,
    model: String,
    settings: ProviderSettings,
}

impl OllamaAdapter {
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
        let mut options = json!({
            "num_predict": params.max_tokens.unwrap_or(self.settings.max_tokens),
        });
        if let Some(temperature) = params.temperature {
            options["temperature"] = json!(temperature);
        }
        let mut body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": stream,
            "options": options,
        });
        if let Some(system) = params.system_prompt.as_deref() {
            body["system"] = json!(system);
        }
        body
    }

    async fn send(
        &self,
        prompt: &str,
        params: &GenerationParams,
        stream: bool,
    ) -> Result<reqwest::Response, AdapterError> {
        let url = self.settings.endpoint(GENERATE_PATH);
        debug!(model = %self.model, stream, "POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(&self.request_body(prompt, params, stream))
            .send()
            .await
            .map_err(from_reqwest)?;
        ensure_success(response).await
    }
}

/// One NDJSON object from `/api/generate`
#[derive(Debug, Deserialize)]
struct GenerateLine {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

impl GenerateLine {
    fn parse(line: &str) -> Result<Self, AdapterError> {
        let parsed: GenerateLine = serde_json::from_str(line)
            .map_err(|e| AdapterError::MalformedResponse(format!("invalid JSON line: {}", e)))?;
        match parsed.error {
            Some(error) => Err(AdapterError::ProviderUnavailable(error)),
            None => Ok(parsed),
        }
    }

    fn usage(&self) -> Option<TokenUsage> {
        match (self.prompt_eval_count, self.eval_count) {
            (None, None) => None,
            (p, c) => Some(TokenUsage::new(p.unwrap_or(0), c.unwrap_or(0))),
        }
    }
}

fn parse_response(body: &str) -> Result<Generation, AdapterError> {
    let line = GenerateLine::parse(body)?;
    if line.response.trim().is_empty() {
        return Err(AdapterError::MalformedResponse(
            "response had no content".to_string(),
        ));
    }
    let usage = line.usage();
    let mut generation = Generation::new(line.response);
    if let Some(usage) = usage {
        generation = generation.with_tokens(usage);
    }
    Ok(generation)
}

/// Feed one NDJSON line into the accumulated text, returning its delta and the `done` flag
fn apply_line(line: &str, full_text: &mut String) -> Result<(Option<String>, bool), AdapterError> {
    let parsed = GenerateLine::parse(line)?;
    let delta = (!parsed.response.is_empty()).then(|| {
        full_text.push_str(&parsed.response);
        parsed.response.clone()
    });
    Ok((delta, parsed.done))
}

async fn pump_ndjson(response: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
    let mut bytes = response.bytes_stream();
    let mut lines = LineBuffer::new();
    let mut full_text = String::new();

    loop {
        let (batch, eof) = match bytes.next().await {
            Some(Ok(chunk)) => match lines.push(&chunk) {
                Ok(batch) => (batch, false),
                Err(e) => {
                    let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                    return;
                }
            },
            Some(Err(e)) => {
                let _ = tx.send(StreamEvent::Error(from_reqwest(e).to_string())).await;
                return;
            }
            None => (lines.finish().into_iter().collect::<Vec<_>>(), true),
        };

        for line in batch {
            match apply_line(&line, &mut full_text) {
                Ok((delta, done)) => {
                    if let Some(delta) = delta
                        && tx.send(StreamEvent::Delta(delta)).await.is_err()
                    {
                        return;
                    }
                    if done {
                        let _ = tx.send(StreamEvent::Completed(full_text)).await;
                        return;
                    }
                }
                Err(e) => {
                    let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                    return;
                }
            }
        }

        if eof {
            break;
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
impl ProviderAdapter for OllamaAdapter {
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
        tokio::spawn(pump_ndjson(response, tx));
        Ok(StreamHandle::new(rx))
    }

    fn describe(&self) -> Capabilities {
        Capabilities::new(8_192).with_streaming()
    }
}
