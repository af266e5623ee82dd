//! Scripted client for tests and dry runs.

use super::{LlmClient, LlmResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays queued responses in order; once the queue is empty, repeats `fallback`.
/// Every prompt is recorded.
pub struct FakeClient {
    model: String,
    queue: Mutex<VecDeque<anyhow::Result<String>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            queue: Mutex::new(VecDeque::new()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    pub fn push(&self, text: impl Into<String>) {
        if let Ok(mut q) = self.queue.lock() {
            q.push_back(Ok(text.into()));
        }
    }

    pub fn push_error(&self, message: impl Into<String>) {
        if let Ok(mut q) = self.queue.lock() {
            q.push_back(Err(anyhow::anyhow!(message.into())));
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for FakeClient {
    async fn complete(
        &self,
        prompt: &str,
        _context: Option<&[String]>,
    ) -> anyhow::Result<LlmResponse> {
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_string());
        }
        let next = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        let text = match next {
            Some(scripted) => scripted?,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| anyhow::anyhow!("fake client has no scripted response left"))?,
        };
        Ok(LlmResponse {
            text,
            provider: self.provider_name().to_string(),
            model: self.model.clone(),
            meta: serde_json::json!({}),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
