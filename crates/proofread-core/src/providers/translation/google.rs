use super::{TranslationService, GOOGLE_TRANSLATE};
use crate::errors::RunError;
use crate::providers::llm::status_error;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

pub const DEFAULT_TRANSLATE_URL: &str = "https://translation.googleapis.com/language/translate/v2";

/// Cloud Translation v2 over REST, authenticated with an API key.
pub struct GoogleTranslateClient {
    pub api_key: String,
    pub base_url: String,
    pub client: reqwest::Client,
}

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Deserialize)]
struct TranslateData {
    translations: Vec<TranslatedText>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslatedText {
    translated_text: String,
}

impl GoogleTranslateClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_TRANSLATE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TranslationService for GoogleTranslateClient {
    async fn translate(&self, text: &str, source: &str, target: &str) -> anyhow::Result<String> {
        let body = json!({
            "q": text,
            "source": source,
            "target": target,
            "format": "text",
        });

        let resp = self
            .client
            .post(&self.base_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| RunError::network(GOOGLE_TRANSLATE, e.to_string()))?;
        if !resp.status().is_success() {
            return Err(status_error(resp, GOOGLE_TRANSLATE).await);
        }
        let parsed: TranslateResponse = resp
            .json()
            .await
            .map_err(|e| RunError::network(GOOGLE_TRANSLATE, e.to_string()))?;

        parsed
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| anyhow::anyhow!("translation response has no translations"))
    }

    fn service_name(&self) -> &str {
        GOOGLE_TRANSLATE
    }
}
