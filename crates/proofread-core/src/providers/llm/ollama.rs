use super::{status_error, LlmClient, LlmResponse};
use crate::errors::RunError;
use async_trait::async_trait;
use serde_json::json;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Local Ollama server, `/api/generate` with JSON-constrained output.
pub struct OllamaClient {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(model: String, base_url: Option<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature,
            max_tokens,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(
        &self,
        prompt: &str,
        context: Option<&[String]>,
    ) -> anyhow::Result<LlmResponse> {
        let url = format!("{}/api/generate", self.base_url);
        let mut body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "format": "json",
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            },
        });
        if let Some(ctx) = context.filter(|c| !c.is_empty()) {
            body["system"] = json!(ctx.join("\n\n"));
        }

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RunError::network(self.provider_name(), e.to_string()))?;
        if !resp.status().is_success() {
            return Err(status_error(resp, self.provider_name()).await);
        }
        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| RunError::network(self.provider_name(), e.to_string()))?;

        let text = json
            .get("response")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Ollama response missing 'response' field"))?
            .to_string();

        Ok(LlmResponse {
            text,
            provider: self.provider_name().to_string(),
            model: self.model.clone(),
            meta: json!({
                "usage": {
                    "input_tokens": json.get("prompt_eval_count"),
                    "output_tokens": json.get("eval_count"),
                }
            }),
        })
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
