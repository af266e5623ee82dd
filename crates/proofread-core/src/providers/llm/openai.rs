use super::{status_error, LlmClient, LlmResponse};
use crate::errors::RunError;
use async_trait::async_trait;
use serde_json::json;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIClient {
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(
        model: String,
        api_key: String,
        base_url: Option<String>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            model,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature,
            max_tokens,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(
        &self,
        prompt: &str,
        context: Option<&[String]>,
    ) -> anyhow::Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut messages = Vec::new();
        if let Some(ctx) = context {
            for system in ctx {
                messages.push(json!({ "role": "system", "content": system }));
            }
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": { "type": "json_object" },
        });

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
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

        // choices[0].message.content
        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("OpenAI API response missing content"))?
            .to_string();

        Ok(LlmResponse {
            text,
            provider: self.provider_name().to_string(),
            model: self.model.clone(),
            meta: json!({
                "usage": {
                    "input_tokens": json.pointer("/usage/prompt_tokens"),
                    "output_tokens": json.pointer("/usage/completion_tokens"),
                }
            }),
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
