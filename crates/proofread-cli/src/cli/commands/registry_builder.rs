use proofread_core::config::Settings;
use proofread_core::providers::llm::{build_client, LlmClient};
use proofread_core::registry::ExperimentRegistry;
use proofread_metrics::{default_experiments, BuiltinFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Judge client for the configured LLM. A client that cannot be built (e.g. missing API key)
/// leaves the judge-backed experiments unregistered instead of failing the command.
pub(crate) fn judge_client(settings: &Settings) -> Option<Arc<dyn LlmClient>> {
    match build_client(&settings.llm, &settings.llm.model) {
        Ok(client) => Some(client),
        Err(e) => {
            let message = format!("{e:#}");
            tracing::warn!(error = %message, "LLM judge unavailable; judge-backed experiments not registered");
            None
        }
    }
}

/// Built-ins first, then plugin units. An explicit `plugin_dir` always gets scanned;
/// the settings default is scanned only when it exists.
pub(crate) fn build_registry(settings: &Settings, plugin_dir: Option<&Path>) -> ExperimentRegistry {
    let judge = judge_client(settings);
    let mut registry = ExperimentRegistry::new();
    registry.extend(default_experiments(judge.clone()));

    let (dir, explicit) = match plugin_dir {
        Some(dir) => (dir.to_path_buf(), true),
        None => (PathBuf::from(&settings.plugin_dir), false),
    };
    if explicit || dir.is_dir() {
        registry.discover(&dir, &BuiltinFactory::new(judge));
    } else {
        tracing::debug!(dir = %dir.display(), "no plugin directory");
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofread_core::config::LlmProvider;

    #[test]
    fn missing_api_key_keeps_only_rouge() {
        let mut settings = Settings::default();
        settings.llm.provider = LlmProvider::Openai;
        settings.llm.api_key_env = "PROOFREAD_TEST_KEY_THAT_IS_NEVER_SET".into();
        settings.plugin_dir = "/nonexistent/proofread/plugins".into();
        let registry = build_registry(&settings, None);
        assert_eq!(registry.names(), vec!["rouge_experiment"]);
    }

    #[test]
    fn plugin_units_extend_builtins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("extra.yaml"),
            "experiments:\n  - kind: rouge\n    name: rouge_strict\n",
        )
        .unwrap();
        let registry = build_registry(&Settings::default(), Some(dir.path()));
        let names = registry.names();
        assert_eq!(names.first().map(String::as_str), Some("rouge_experiment"));
        assert_eq!(names.last().map(String::as_str), Some("rouge_strict"));
        assert!(names.iter().any(|n| n == "faithfulness"));
    }
}
