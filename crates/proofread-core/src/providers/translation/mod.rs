//! Non-model translation services. Their output is appended to the manifest under the
//! service name as author, so the translation matrix scores it like any candidate model.

pub mod fake;
pub mod google;

use crate::config::TranslationServiceSettings;
use crate::errors::{ConfigError, RunError, RunErrorKind};
use async_trait::async_trait;
use std::sync::Arc;

pub const GOOGLE_TRANSLATE: &str = "google_translate";

/// Machine translation between ISO 639-1 language codes.
#[async_trait]
pub trait TranslationService: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> anyhow::Result<String>;

    /// Recorded as the `author` of every translation the service produces.
    fn service_name(&self) -> &str;
}

pub fn build_service(
    name: &str,
    settings: &TranslationServiceSettings,
) -> anyhow::Result<Arc<dyn TranslationService>> {
    match name {
        GOOGLE_TRANSLATE => {
            let api_key = std::env::var(&settings.api_key_env).map_err(|_| {
                RunError::new(
                    RunErrorKind::MissingConfig,
                    format!("environment variable {} is not set", settings.api_key_env),
                )
                .with_provider(GOOGLE_TRANSLATE)
            })?;
            Ok(Arc::new(google::GoogleTranslateClient::new(
                api_key,
                settings.base_url.clone(),
            )))
        }
        other => Err(ConfigError::InvalidArgs(format!("unknown translation service '{}'", other)).into()),
    }
}

const LANGUAGE_CODES: &[(&str, &str)] = &[
    ("English", "en"),
    ("Spanish", "es"),
    ("Chinese", "zh"),
    ("Vietnamese", "vi"),
    ("Tagalog", "tl"),
    ("Korean", "ko"),
    ("Arabic", "ar"),
    ("Armenian", "hy"),
    ("French", "fr"),
    ("German", "de"),
    ("Haitian", "ht"),
    ("Hindi", "hi"),
    ("Japanese", "ja"),
    ("Khmer", "km"),
    ("Persian", "fa"),
    ("Portuguese", "pt"),
    ("Punjabi", "pa"),
    ("Russian", "ru"),
    ("Ukrainian", "uk"),
];

/// ISO 639-1 code for a language name, matched case-insensitively.
pub fn language_code(language: &str) -> Option<&'static str> {
    let language = language.trim();
    LANGUAGE_CODES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(language))
        .map(|(_, code)| *code)
}
