use super::super::args::{EvalMode, EvaluateArgs};
use super::registry_builder::build_registry;
use crate::exit_codes;
use proofread_core::config::{resolve_settings, Settings};
use proofread_core::engine::{has_analyses, unconfigured_languages, Runner};
use proofread_core::errors::ConfigError;
use proofread_core::manifest::{hydrate_manifest, load_manifest, write_output};
use proofread_core::registry::parse_allow_list;
use proofread_core::report::progress::logging_sink;
use std::path::Path;
use tokio_util::sync::CancellationToken;

const PROGRESS_EVERY: usize = 10;

pub async fn run(args: EvaluateArgs, config: Option<&Path>) -> anyhow::Result<i32> {
    let mut settings = resolve_settings(config)?;
    apply_overrides(&mut settings, &args)?;

    let mut manifest = load_manifest(&args.manifest)?;
    let base_dir = args.manifest.parent().unwrap_or_else(|| Path::new("."));
    hydrate_manifest(&mut manifest, base_dir)?;

    let registry = build_registry(&settings, args.plugin_dir.as_deref());
    let allow_list = parse_allow_list(&args.experiments);
    let mode = args.mode.unwrap_or(if has_analyses(&manifest) {
        EvalMode::Analysis
    } else {
        EvalMode::Translation
    });

    for language in unconfigured_languages(&manifest, &settings) {
        tracing::warn!(language = %language, "manifest language is not in supported_languages; it will not be compared");
    }

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; finishing in-flight experiments");
            watcher.cancel();
        }
    });

    let runner = Runner::new(registry, settings)
        .with_progress(logging_sink(PROGRESS_EVERY))
        .with_cancel(cancel);

    let outcome = match mode {
        EvalMode::Translation => {
            let artifacts = runner.run_translation_matrix(&manifest, &allow_list).await;
            artifacts.and_then(|a| write_output(&a.scenarios, args.output.as_deref()))
        }
        EvalMode::Analysis => {
            let report = runner.run_analysis_metrics(&mut manifest, &allow_list).await;
            report.and_then(|_| write_output(&manifest, args.output.as_deref()))
        }
    };
    ctrl_c.abort();
    outcome?;
    Ok(exit_codes::SUCCESS)
}

fn apply_overrides(settings: &mut Settings, args: &EvaluateArgs) -> Result<(), ConfigError> {
    if let Some(parallel) = args.parallel {
        if parallel == 0 {
            return Err(ConfigError::InvalidArgs("--parallel must be at least 1".into()));
        }
        settings.parallel = parallel;
    }
    if let Some(timeout) = args.timeout_seconds {
        settings.timeout_seconds = timeout;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> EvaluateArgs {
        EvaluateArgs {
            manifest: PathBuf::from("m.json"),
            output: None,
            experiments: String::new(),
            mode: None,
            plugin_dir: None,
            parallel: None,
            timeout_seconds: None,
        }
    }

    #[test]
    fn overrides_replace_settings() {
        let mut settings = Settings::default();
        let args = EvaluateArgs {
            parallel: Some(8),
            timeout_seconds: Some(0),
            ..args()
        };
        apply_overrides(&mut settings, &args).unwrap();
        assert_eq!(settings.parallel, 8);
        assert_eq!(settings.timeout_seconds, 0);
    }

    #[test]
    fn zero_parallel_is_invalid() {
        let mut settings = Settings::default();
        let args = EvaluateArgs {
            parallel: Some(0),
            ..args()
        };
        assert!(matches!(
            apply_overrides(&mut settings, &args),
            Err(ConfigError::InvalidArgs(_))
        ));
        assert_eq!(settings.parallel, 1);
    }
}
