pub mod fake;
pub mod ollama;
pub mod openai;

use crate::config::{LlmProvider, LlmSettings};
use crate::errors::RunError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// A text-completion backend. `context` carries system-level instructions.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, context: Option<&[String]>)
        -> anyhow::Result<LlmResponse>;

    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> &str;
}

/// Client for `model` on the configured provider. The OpenAI key is read from the
/// environment variable named by `settings.api_key_env`.
pub fn build_client(settings: &LlmSettings, model: &str) -> anyhow::Result<Arc<dyn LlmClient>> {
    match settings.provider {
        LlmProvider::Ollama => Ok(Arc::new(ollama::OllamaClient::new(
            model.to_string(),
            settings.base_url.clone(),
            settings.temperature,
            settings.max_tokens,
        ))),
        LlmProvider::Openai => {
            let api_key = std::env::var(&settings.api_key_env).map_err(|_| {
                RunError::judge_unavailable(format!(
                    "environment variable {} is not set",
                    settings.api_key_env
                ))
            })?;
            Ok(Arc::new(openai::OpenAIClient::new(
                model.to_string(),
                api_key,
                settings.base_url.clone(),
                settings.temperature,
                settings.max_tokens,
            )))
        }
    }
}

/// First JSON object embedded in model output (models wrap JSON in prose or code fences).
pub fn extract_json_object(text: &str) -> anyhow::Result<serde_json::Value> {
    let text = text.trim();
    let start = text
        .find('{')
        .ok_or_else(|| anyhow::anyhow!("no JSON object found in model output"))?;
    let value: serde_json::Value = serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<serde_json::Value>()
        .next()
        .ok_or_else(|| anyhow::anyhow!("no JSON object found in model output"))?
        .map_err(|e| anyhow::anyhow!("invalid JSON in model output: {}", e))?;
    Ok(value)
}

/// Drops a leading `<think>...</think>` block emitted by reasoning models.
pub fn strip_reasoning(text: &str) -> &str {
    match text.find("</think>") {
        Some(end) if text.trim_start().starts_with("<think>") => text[end + "</think>".len()..].trim(),
        _ => text.trim(),
    }
}

/// Maps a non-success HTTP response to a classified error.
pub(crate) async fn status_error(resp: reqwest::Response, provider: &str) -> anyhow::Error {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    RunError::from_status(status, provider, body).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_wrapped_in_prose() {
        let v = extract_json_object("Sure! ```json\n{\"score\": 0.5, \"reason\": \"ok\"}\n``` done").unwrap();
        assert_eq!(v["score"], 0.5);
        assert_eq!(v["reason"], "ok");
    }

    #[test]
    fn missing_object_is_error() {
        assert!(extract_json_object("no json here").is_err());
        assert!(extract_json_object("{\"open\": ").is_err());
    }

    #[test]
    fn reasoning_block_is_removed() {
        assert_eq!(strip_reasoning("<think>hmm {x}</think>\n{\"text\": \"hola\"}"), "{\"text\": \"hola\"}");
        assert_eq!(strip_reasoning("  plain  "), "plain");
    }

    #[test]
    fn openai_without_key_is_judge_unavailable() {
        let settings = LlmSettings {
            provider: LlmProvider::Openai,
            api_key_env: "PROOFREAD_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..LlmSettings::default()
        };
        let err = build_client(&settings, "gpt-4.1-mini").err().unwrap();
        let classified = RunError::from_anyhow(&err);
        assert_eq!(classified.kind.as_str(), "judge_unavailable");
    }
}
