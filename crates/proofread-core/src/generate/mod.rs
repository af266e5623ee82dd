//! Generation stage: fills a manifest with model translations and analyses before scoring.
//!
//! Calls run with at most `generation_parallel` requests in flight. Results are appended in
//! task order regardless of completion order. A failed call is logged and skipped; there are
//! no retries.

pub mod prompts;

use crate::config::Settings;
use crate::errors::ConfigError;
use crate::model::{same_language, Analysis, AnalysisQuestion, Manifest, Translation};
use crate::providers::llm::{extract_json_object, strip_reasoning, LlmClient};
use crate::providers::translation::{language_code, TranslationService};
use prompts::{ANALYSIS_PROMPTS, TRANSLATION_PROMPTS};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub model: String,
    pub attempted: usize,
    pub appended: usize,
    pub failed: usize,
    /// Already present in the manifest, not requested again.
    pub existing: usize,
}

struct TranslationTask {
    document: usize,
    label: String,
    language: String,
    part: Option<u32>,
    prompt_name: &'static str,
    prompt: String,
}

struct ServiceTask {
    document: usize,
    label: String,
    language: String,
    target_code: &'static str,
    part: Option<u32>,
    text: String,
}

struct AnalysisTask {
    document: usize,
    label: String,
    prompt_name: &'static str,
    prompt: String,
    questions: usize,
}

#[derive(Deserialize)]
struct GeneratedTranslation {
    text: String,
}

#[derive(Deserialize)]
struct GeneratedAnalysis {
    summary: String,
    #[serde(default)]
    questions: Vec<AnalysisQuestion>,
}

/// Translates every reference-language baseline (each part) into every target language with
/// every translation prompt, appending `Translation { author: <model>, prompt, part }`.
pub async fn translate_manifest(
    manifest: &mut Manifest,
    client: Arc<dyn LlmClient>,
    settings: &Settings,
) -> anyhow::Result<GenerationReport> {
    let model = client.model_name().to_string();
    let mut report = GenerationReport {
        model: model.clone(),
        ..GenerationReport::default()
    };

    let mut tasks = Vec::new();
    for (d, document) in manifest.documents.iter().enumerate() {
        let label = document.label(d);
        let sources =
            document.references_in(&settings.reference_language, &settings.reference_author);
        if sources.is_empty() {
            tracing::warn!(document = %label, "no reference-language baseline to translate");
            continue;
        }
        for source in sources {
            for language in settings.target_languages() {
                for prompt in TRANSLATION_PROMPTS {
                    let exists = document.translations.iter().any(|t| {
                        same_language(&t.language, &language)
                            && t.author == model
                            && t.prompt.as_deref() == Some(prompt.name)
                            && t.part == source.part
                    });
                    if exists {
                        report.existing += 1;
                        continue;
                    }
                    tasks.push(TranslationTask {
                        document: d,
                        label: label.clone(),
                        language: language.clone(),
                        part: source.part,
                        prompt_name: prompt.name,
                        prompt: (prompt.render)(&settings.reference_language, &language, &source.text),
                    });
                }
            }
        }
    }

    report.attempted = tasks.len();
    tracing::info!(model = %model, tasks = tasks.len(), "translating manifest");

    let calls: Vec<String> = tasks.iter().map(|t| t.prompt.clone()).collect();
    let outputs = run_bounded(calls, settings.generation_parallel, {
        let client = client.clone();
        move |prompt: String| {
            let client = client.clone();
            async move {
                let resp = client.complete(&prompt, None).await?;
                let value = extract_json_object(strip_reasoning(&resp.text))?;
                let generated: GeneratedTranslation = serde_json::from_value(value)
                    .map_err(|e| anyhow::anyhow!("translation JSON has no usable 'text': {}", e))?;
                Ok(generated.text)
            }
        }
    })
    .await;

    for (task, output) in tasks.into_iter().zip(outputs) {
        match output {
            Ok(text) => {
                let mut translation =
                    Translation::new(task.language, model.clone(), text).with_prompt(task.prompt_name);
                translation.part = task.part;
                manifest.documents[task.document].translations.push(translation);
                report.appended += 1;
            }
            Err(e) => {
                report.failed += 1;
                let error = format!("{:#}", e);
                tracing::error!(
                    document = %task.label,
                    language = %task.language,
                    model = %model,
                    error = %error,
                    "translation failed; skipping"
                );
            }
        }
    }

    tracing::info!(
        model = %model,
        appended = report.appended,
        failed = report.failed,
        existing = report.existing,
        "translation complete"
    );
    Ok(report)
}

/// Sends every reference-language baseline (each part) to a translation service once per
/// target language, appending `Translation { author: <service>, prompt: None, part }`.
/// Languages without a known ISO 639-1 code are skipped with a warning.
pub async fn translate_with_service(
    manifest: &mut Manifest,
    service: Arc<dyn TranslationService>,
    settings: &Settings,
) -> anyhow::Result<GenerationReport> {
    let author = service.service_name().to_string();
    let mut report = GenerationReport {
        model: author.clone(),
        ..GenerationReport::default()
    };
    let source_code = language_code(&settings.reference_language).ok_or_else(|| {
        ConfigError::InvalidArgs(format!(
            "no language code known for reference language '{}'",
            settings.reference_language
        ))
    })?;
    let mut targets = Vec::new();
    for language in settings.target_languages() {
        match language_code(&language) {
            Some(code) => targets.push((language, code)),
            None => tracing::warn!(service = %author, language = %language, "no language code known; skipping"),
        }
    }

    let mut tasks = Vec::new();
    for (d, document) in manifest.documents.iter().enumerate() {
        let label = document.label(d);
        let sources =
            document.references_in(&settings.reference_language, &settings.reference_author);
        if sources.is_empty() {
            tracing::warn!(document = %label, "no reference-language baseline to translate");
            continue;
        }
        for source in sources {
            for (language, code) in &targets {
                let exists = document.translations.iter().any(|t| {
                    same_language(&t.language, language)
                        && t.author == author
                        && t.prompt.is_none()
                        && t.part == source.part
                });
                if exists {
                    report.existing += 1;
                    continue;
                }
                tasks.push(ServiceTask {
                    document: d,
                    label: label.clone(),
                    language: language.clone(),
                    target_code: *code,
                    part: source.part,
                    text: source.text.clone(),
                });
            }
        }
    }

    report.attempted = tasks.len();
    tracing::info!(service = %author, tasks = tasks.len(), "translating manifest with service");

    let calls: Vec<(String, &'static str)> =
        tasks.iter().map(|t| (t.text.clone(), t.target_code)).collect();
    let outputs = run_bounded(calls, settings.generation_parallel, {
        let service = service.clone();
        move |(text, target): (String, &'static str)| {
            let service = service.clone();
            async move { service.translate(&text, source_code, target).await }
        }
    })
    .await;

    for (task, output) in tasks.into_iter().zip(outputs) {
        match output {
            Ok(text) => {
                let mut translation = Translation::new(task.language, author.clone(), text);
                translation.part = task.part;
                manifest.documents[task.document].translations.push(translation);
                report.appended += 1;
            }
            Err(e) => {
                report.failed += 1;
                let error = format!("{:#}", e);
                tracing::error!(
                    document = %task.label,
                    language = %task.language,
                    service = %author,
                    error = %error,
                    "service translation failed; skipping"
                );
            }
        }
    }
    Ok(report)
}

/// Runs every analysis prompt over every document's source text, appending one
/// `Analysis` per (document, prompt) tagged with the model and prompt name.
pub async fn analyze_manifest(
    manifest: &mut Manifest,
    client: Arc<dyn LlmClient>,
    settings: &Settings,
) -> anyhow::Result<GenerationReport> {
    let model = client.model_name().to_string();
    let mut report = GenerationReport {
        model: model.clone(),
        ..GenerationReport::default()
    };

    let mut tasks = Vec::new();
    for (d, document) in manifest.documents.iter().enumerate() {
        let label = document.label(d);
        let Some(text) = document.text.as_deref() else {
            tracing::warn!(document = %label, "no source text to analyze");
            continue;
        };
        for prompt in ANALYSIS_PROMPTS {
            let exists = document.notice_analysis.iter().any(|a| {
                a.llm_model_name.as_deref() == Some(model.as_str())
                    && a.prompt_name.as_deref() == Some(prompt.name)
            });
            if exists {
                report.existing += 1;
                continue;
            }
            tasks.push(AnalysisTask {
                document: d,
                label: label.clone(),
                prompt_name: prompt.name,
                prompt: (prompt.render)(text),
                questions: prompt.questions.len(),
            });
        }
    }

    report.attempted = tasks.len();
    tracing::info!(model = %model, tasks = tasks.len(), "analyzing manifest");

    let calls: Vec<(String, usize)> = tasks.iter().map(|t| (t.prompt.clone(), t.questions)).collect();
    let outputs = run_bounded(calls, settings.generation_parallel, {
        let client = client.clone();
        move |(prompt, expected): (String, usize)| {
            let client = client.clone();
            async move {
                let resp = client.complete(&prompt, None).await?;
                let value = extract_json_object(strip_reasoning(&resp.text))?;
                let generated: GeneratedAnalysis = serde_json::from_value(value)
                    .map_err(|e| anyhow::anyhow!("analysis JSON is malformed: {}", e))?;
                if generated.questions.len() != expected {
                    anyhow::bail!(
                        "analysis answers {} questions; the prompt asks {}",
                        generated.questions.len(),
                        expected
                    );
                }
                Ok(generated)
            }
        }
    })
    .await;

    for (task, output) in tasks.into_iter().zip(outputs) {
        match output {
            Ok(generated) => {
                tracing::info!(document = %task.label, prompt = task.prompt_name, model = %model, "analysis attached");
                manifest.documents[task.document].notice_analysis.push(Analysis {
                    summary: generated.summary,
                    questions: generated.questions,
                    llm_model_name: Some(model.clone()),
                    prompt_name: Some(task.prompt_name.to_string()),
                    evaluation_results: Vec::new(),
                });
                report.appended += 1;
            }
            Err(e) => {
                report.failed += 1;
                let error = format!("{:#}", e);
                tracing::error!(
                    document = %task.label,
                    prompt = task.prompt_name,
                    model = %model,
                    error = %error,
                    "analysis failed; skipping"
                );
            }
        }
    }
    Ok(report)
}

/// Bounded fan-out returning one outcome per item, in item order.
async fn run_bounded<T, R, F, Fut>(items: Vec<T>, width: usize, call: F) -> Vec<anyhow::Result<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
{
    let total = items.len();
    let sem = Arc::new(Semaphore::new(width.max(1)));
    let mut join_set = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let fut = call(item);
        let sem = sem.clone();
        join_set.spawn(async move {
            let outcome = match sem.acquire_owned().await {
                Ok(_permit) => fut.await,
                Err(e) => Err(anyhow::anyhow!("generation pool closed: {}", e)),
            };
            (index, outcome)
        });
    }

    let mut slots: Vec<Option<anyhow::Result<R>>> = (0..total).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(e) => tracing::error!(error = %e, "generation task did not complete"),
        }
    }
    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(anyhow::anyhow!("generation task did not complete"))))
        .collect()
}
