//! Deterministic stand-in for a real provider
//!
//! Bound by the registry when credentials are missing or mocking is
//! forced. Output is prefixed with `[mock:<model_id>]`.

use async_trait::async_trait;
use tokio::sync::mpsc;
use ultra_application::{AdapterError, Generation, ProviderAdapter, StreamHandle};
use ultra_domain::core::string::{collapse_whitespace, truncate};
use ultra_domain::{Capabilities, GenerationParams, ModelId, StreamEvent};

const ECHO_LEN: usize = 80;

#[derive(Debug, Clone)]
pub struct MockAdapter {
    model: ModelId,
}

impl MockAdapter {
    pub fn new(model: ModelId) -> Self {
        Self { model }
    }

    /// The text every call for `prompt` returns
    pub fn render(&self, prompt: &str) -> String {
        let echo = truncate(&collapse_whitespace(prompt), ECHO_LEN);
        format!(
            "[mock:{}] placeholder response (no live provider configured) to: {}",
            self.model, echo
        )
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<Generation, AdapterError> {
        Ok(Generation::new(self.render(prompt)))
    }

    async fn stream_generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<StreamHandle, AdapterError> {
        let text = self.render(prompt);
        let words: Vec<String> = text.split_inclusive(' ').map(str::to_string).collect();
        let (tx, rx) = mpsc::channel(words.len() + 1);
        for word in words {
            let _ = tx.send(StreamEvent::Delta(word)).await;
        }
        let _ = tx.send(StreamEvent::Completed(text)).await;
        Ok(StreamHandle::new(rx))
    }

    fn describe(&self) -> Capabilities {
        Capabilities::new(1_000_000).with_streaming()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock() -> MockAdapter {
        MockAdapter::new(ModelId::new("openai:gpt-4o"))
    }

    #[tokio::test]
    async fn test_output_is_labelled_and_deterministic() {
        let params = GenerationParams::default();
        let a = mock().generate("Define   entropy", &params).await.unwrap();
        let b = mock().generate("Define entropy", &params).await.unwrap();
        assert!(a.text.starts_with("[mock:openai:gpt-4o]"));
        assert!(a.text.ends_with("Define entropy"));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_stream_matches_generate() {
        let params = GenerationParams::default();
        let whole = mock().generate("Define entropy", &params).await.unwrap();
        let mut handle = mock().stream_generate("Define entropy", &params).await.unwrap();

        let mut deltas = 0;
        let mut joined = String::new();
        while let Some(event) = handle.receiver.recv().await {
            match event {
                StreamEvent::Delta(chunk) => {
                    deltas += 1;
                    joined.push_str(&chunk);
                }
                StreamEvent::Completed(text) => {
                    assert_eq!(text, whole.text);
                    break;
                }
                StreamEvent::Error(e) => panic!("mock stream failed: {e}"),
            }
        }
        assert!(deltas > 1);
        assert_eq!(joined, whole.text);
    }

    #[test]
    fn test_long_prompts_are_truncated() {
        let text = mock().render(&"word ".repeat(100));
        assert!(text.ends_with("..."));
    }
}
