use crate::errors::ConfigError;
use crate::model::{same_language, REFERENCE_AUTHOR};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SUPPORTED_SETTINGS_VERSION: u32 = 1;

/// Environment variable consulted when no `--config` path is given.
pub const CONFIG_ENV_VAR: &str = "PROOFREAD_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub version: u32,
    pub reference_language: String,
    pub supported_languages: Vec<String>,
    pub reference_author: String,
    /// Models whose translations are scored against the reference.
    pub candidate_models: Vec<String>,
    /// Non-model translation services whose output is scored against the reference.
    pub translation_services: Vec<String>,
    pub plugin_dir: String,
    /// Concurrent experiment invocations. 1 keeps the sweep strictly sequential.
    pub parallel: usize,
    pub timeout_seconds: u64,
    /// Concurrent in-flight model calls during generation.
    pub generation_parallel: usize,
    pub llm: LlmSettings,
    pub translation: TranslationServiceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SUPPORTED_SETTINGS_VERSION,
            reference_language: "English".into(),
            supported_languages: [
                "English",
                "Spanish",
                "Chinese",
                "Vietnamese",
                "Tagalog",
                "Korean",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            reference_author: REFERENCE_AUTHOR.into(),
            candidate_models: vec!["aya-expanse:8b".into(), "mistral-nemo:latest".into()],
            translation_services: vec!["google_translate".into()],
            plugin_dir: "experiments".into(),
            parallel: 1,
            timeout_seconds: 120,
            generation_parallel: 2,
            llm: LlmSettings::default(),
            translation: TranslationServiceSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Ollama,
    Openai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    /// Model used by judge-backed experiments.
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Name of the environment variable holding the API key (OpenAI only).
    pub api_key_env: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            model: "deepseek-r1:8b".into(),
            base_url: None,
            temperature: 0.0,
            max_tokens: 1024,
            api_key_env: "OPENAI_API_KEY".into(),
        }
    }
}

/// Connection settings for the non-model translation services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslationServiceSettings {
    /// Environment variable holding the Cloud Translation API key.
    pub api_key_env: String,
    pub base_url: Option<String>,
}

impl Default for TranslationServiceSettings {
    fn default() -> Self {
        Self {
            api_key_env: "GOOGLE_TRANSLATE_API_KEY".into(),
            base_url: None,
        }
    }
}

impl Settings {
    /// Supported languages minus the reference language. Computed fresh on every call.
    pub fn target_languages(&self) -> Vec<String> {
        self.supported_languages
            .iter()
            .filter(|l| !same_language(l, &self.reference_language))
            .cloned()
            .collect()
    }

    /// Authors compared against the reference: every candidate model, then every service.
    pub fn candidate_authors(&self) -> Vec<String> {
        self.candidate_models
            .iter()
            .chain(self.translation_services.iter())
            .cloned()
            .collect()
    }
}

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::SettingsRead {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;
    let settings: Settings =
        serde_yaml::from_str(&raw).map_err(|e| ConfigError::SettingsParse {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
    if settings.version != SUPPORTED_SETTINGS_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            found: settings.version,
            supported: SUPPORTED_SETTINGS_VERSION,
        });
    }
    if settings.parallel == 0 || settings.generation_parallel == 0 {
        return Err(ConfigError::InvalidArgs(
            "parallel and generation_parallel must be at least 1".into(),
        ));
    }
    Ok(settings)
}

/// Explicit path first, then `PROOFREAD_CONFIG`, then defaults.
pub fn resolve_settings(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
    if let Some(path) = explicit {
        return load_settings(path);
    }
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => load_settings(Path::new(path.trim())),
        _ => Ok(Settings::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn target_languages_exclude_reference_without_mutating() {
        let settings = Settings {
            reference_language: "english".into(),
            ..Settings::default()
        };
        let first = settings.target_languages();
        let second = settings.target_languages();
        assert_eq!(first, second);
        assert!(!first.iter().any(|l| l == "English"));
        assert_eq!(settings.supported_languages.len(), first.len() + 1);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "version: 1\ncandidate_models: [modelX]\nllm:\n  provider: openai\n  model: gpt-4.1-mini").unwrap();
        let settings = load_settings(f.path()).unwrap();
        assert_eq!(settings.candidate_models, vec!["modelX".to_string()]);
        assert_eq!(settings.reference_language, "English");
        assert_eq!(settings.llm.provider, LlmProvider::Openai);
        assert_eq!(settings.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(settings.translation.api_key_env, "GOOGLE_TRANSLATE_API_KEY");
    }

    #[test]
    fn unknown_fields_and_versions_are_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "version: 1\nlanguages: [English]").unwrap();
        assert!(matches!(
            load_settings(f.path()),
            Err(ConfigError::SettingsParse { .. })
        ));

        let mut g = tempfile::NamedTempFile::new().unwrap();
        writeln!(g, "version: 2").unwrap();
        assert!(matches!(
            load_settings(g.path()),
            Err(ConfigError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn candidate_authors_list_models_before_services() {
        let settings = Settings::default();
        assert_eq!(
            settings.candidate_authors(),
            vec!["aya-expanse:8b", "mistral-nemo:latest", "google_translate"]
        );
    }
}
