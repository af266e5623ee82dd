use super::super::args::GenerateArgs;
use crate::exit_codes;
use proofread_core::config::{resolve_settings, Settings};
use proofread_core::errors::ConfigError;
use proofread_core::generate::{
    analyze_manifest, translate_manifest, translate_with_service, GenerationReport,
};
use proofread_core::manifest::{hydrate_manifest, load_manifest, write_output};
use proofread_core::providers::llm::build_client;
use proofread_core::providers::translation::{build_service, TranslationService};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Translate,
    Analyze,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Translate => "translate",
            Stage::Analyze => "analyze",
        }
    }
}

pub async fn run(args: GenerateArgs, stage: Stage, config: Option<&Path>) -> anyhow::Result<i32> {
    if args.experiments.is_some() {
        return Err(ConfigError::InvalidArgs(format!(
            "--experiments is not accepted by `{}`; use `evaluate`",
            stage.as_str()
        ))
        .into());
    }

    let settings = resolve_settings(config)?;
    let mut manifest = load_manifest(&args.manifest)?;
    let base_dir = args.manifest.parent().unwrap_or_else(|| Path::new("."));
    hydrate_manifest(&mut manifest, base_dir)?;

    let models = if args.models.is_empty() {
        settings.candidate_models.clone()
    } else {
        args.models.clone()
    };
    if models.is_empty() {
        return Err(ConfigError::InvalidArgs("no models given and none configured".into()).into());
    }

    let services = match stage {
        Stage::Translate => translation_services(&settings)?,
        Stage::Analyze => Vec::new(),
    };

    for model in &models {
        let client = build_client(&settings.llm, model)?;
        let report = match stage {
            Stage::Translate => translate_manifest(&mut manifest, client, &settings).await?,
            Stage::Analyze => analyze_manifest(&mut manifest, client, &settings).await?,
        };
        log_report(stage, &report);
    }
    for service in services {
        let report = translate_with_service(&mut manifest, service, &settings).await?;
        log_report(stage, &report);
    }

    write_output(&manifest, args.output.as_deref())?;
    Ok(exit_codes::SUCCESS)
}

/// Unknown service names are configuration errors; a service that cannot be reached
/// (e.g. its API key is not set) is skipped with a warning.
fn translation_services(settings: &Settings) -> anyhow::Result<Vec<Arc<dyn TranslationService>>> {
    let mut services = Vec::new();
    for name in &settings.translation_services {
        match build_service(name, &settings.translation) {
            Ok(service) => services.push(service),
            Err(e) if e.downcast_ref::<ConfigError>().is_some() => return Err(e),
            Err(e) => {
                let error = format!("{:#}", e);
                tracing::warn!(service = %name, error = %error, "translation service unavailable; skipping");
            }
        }
    }
    Ok(services)
}

fn log_report(stage: Stage, report: &GenerationReport) {
    tracing::info!(
        stage = stage.as_str(),
        author = %report.model,
        attempted = report.attempted,
        appended = report.appended,
        failed = report.failed,
        existing = report.existing,
        "generation finished"
    );
}
