use crate::config::Settings;
use crate::errors::{ConfigError, RunError};
use crate::metrics_api::{AnalysisSubject, Experiment, ExperimentKind};
use crate::model::{same_language, Analysis, Document, EvaluationResult, Manifest, Scenario};
use crate::registry::ExperimentRegistry;
use crate::report::progress::{ProgressEvent, ProgressSink};
use crate::report::{RunArtifacts, RunReport};
use crate::scenario::{build_document_scenario, Condition};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

/// Every scenario of a translation-matrix run, built before any experiment executes.
#[derive(Debug, Clone, Default)]
pub struct TranslationPlan {
    pub scenarios: Vec<Scenario>,
    /// Documents without a reference-language baseline.
    pub skipped_documents: Vec<String>,
}

#[derive(Clone)]
pub struct Runner {
    pub registry: ExperimentRegistry,
    pub settings: Settings,
    pub progress: Option<ProgressSink>,
    pub cancel: CancellationToken,
}

/// An analysis detached from its manifest so it can move into a task.
struct OwnedSubject {
    analysis: Analysis,
    source_text: String,
    source_path: String,
}

impl OwnedSubject {
    fn as_subject(&self) -> AnalysisSubject<'_> {
        AnalysisSubject {
            analysis: &self.analysis,
            source_text: &self.source_text,
            source_path: &self.source_path,
        }
    }
}

enum Target {
    Scenario(Arc<Scenario>),
    Analysis(Arc<OwnedSubject>),
}

struct Invocation {
    /// Index of the scenario or analysis the results belong to.
    subject: usize,
    label: String,
    experiment: Experiment,
    target: Target,
}

struct Sweep {
    /// One slot per invocation, in planning order. `None` when cancellation prevented the call.
    slots: Vec<Option<Vec<EvaluationResult>>>,
    cancelled: bool,
}

impl Runner {
    pub fn new(registry: ExperimentRegistry, settings: Settings) -> Self {
        Self {
            registry,
            settings,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Target languages × candidate authors × documents (× parts). Scenario order is the
    /// sweep order: language, then author, then document, then part.
    pub fn plan_translation_matrix(&self, manifest: &Manifest) -> Result<TranslationPlan, ConfigError> {
        let reference_language = &self.settings.reference_language;
        let reference_author = &self.settings.reference_author;

        let mut plan = TranslationPlan::default();
        let mut eligible: Vec<(String, &Document, Vec<Option<u32>>)> = Vec::new();
        for (index, document) in manifest.documents.iter().enumerate() {
            let label = document.label(index);
            if !document.has_reference(reference_language, reference_author) {
                tracing::warn!(
                    document = %label,
                    language = %reference_language,
                    "skipping document: no reference-language baseline translation"
                );
                plan.skipped_documents.push(label);
                continue;
            }
            let mut parts: Vec<Option<u32>> = document
                .references_in(reference_language, reference_author)
                .iter()
                .map(|t| t.part)
                .collect();
            parts.sort();
            parts.dedup();
            eligible.push((label, document, parts));
        }

        for language in self.settings.target_languages() {
            for author in self.settings.candidate_authors() {
                let from = Condition::new()
                    .language(language.as_str())
                    .author(reference_author.as_str());
                let to = Condition::new().language(language.as_str()).author(author.as_str());

                for (label, document, parts) in &eligible {
                    // A single unnumbered chunk needs no part filter.
                    let numbered: Vec<u32> = parts.iter().flatten().copied().collect();
                    if numbered.len() < 2 {
                        if let Some(s) = build_document_scenario(label, document, &from, &to)? {
                            plan.scenarios.push(s);
                        }
                        continue;
                    }
                    for part in numbered {
                        let from = from.clone().part(part);
                        let to = to.clone().part(part);
                        if let Some(s) = build_document_scenario(label, document, &from, &to)? {
                            plan.scenarios.push(s);
                        }
                    }
                }
            }
        }

        tracing::info!(
            scenarios = plan.scenarios.len(),
            skipped_documents = plan.skipped_documents.len(),
            "translation matrix planned"
        );
        Ok(plan)
    }

    /// Scores every planned scenario with every scenario experiment. Configuration problems
    /// (unknown allow-list name, ambiguous translations) abort before anything runs.
    pub async fn run_translation_matrix(
        &self,
        manifest: &Manifest,
        allow_list: &[String],
    ) -> anyhow::Result<RunArtifacts> {
        let selected = self.registry.select(allow_list)?;
        let experiments = applicable(&selected, ExperimentKind::Scenario);
        let plan = self.plan_translation_matrix(manifest)?;

        let mut report = RunReport::new();
        report.experiments = experiments.iter().map(|e| e.name().to_string()).collect();
        report.subjects = plan.scenarios.len();
        report.skipped_documents = plan.skipped_documents;

        let shared: Vec<Arc<Scenario>> = plan.scenarios.into_iter().map(Arc::new).collect();
        let mut invocations = Vec::with_capacity(shared.len() * experiments.len());
        for (subject, scenario) in shared.iter().enumerate() {
            for experiment in &experiments {
                invocations.push(Invocation {
                    subject,
                    label: format!("{}/{}", scenario.document, scenario.name),
                    experiment: experiment.clone(),
                    target: Target::Scenario(scenario.clone()),
                });
            }
        }
        let owners: Vec<usize> = invocations.iter().map(|i| i.subject).collect();

        let sweep = self.sweep(invocations).await?;

        let mut scenarios: Vec<Scenario> = shared
            .into_iter()
            .map(|s| Arc::try_unwrap(s).unwrap_or_else(|shared| (*shared).clone()))
            .collect();
        for (subject, slot) in owners.into_iter().zip(sweep.slots) {
            if let Some(results) = slot {
                report.invocations += 1;
                tally(&mut report, &results);
                scenarios[subject].results.extend(results);
            }
        }
        report.cancelled = sweep.cancelled;
        log_summary(&report, "translation");

        Ok(RunArtifacts { report, scenarios })
    }

    /// Scores every analysis attached to the manifest, appending results to
    /// `Analysis::evaluation_results` in place.
    pub async fn run_analysis_metrics(
        &self,
        manifest: &mut Manifest,
        allow_list: &[String],
    ) -> anyhow::Result<RunReport> {
        let selected = self.registry.select(allow_list)?;
        let experiments = applicable(&selected, ExperimentKind::Analysis);

        let mut report = RunReport::new();
        report.experiments = experiments.iter().map(|e| e.name().to_string()).collect();

        // (document index, analysis index) per subject.
        let mut positions: Vec<(usize, usize)> = Vec::new();
        let mut invocations = Vec::new();
        for (d, document) in manifest.documents.iter().enumerate() {
            if document.notice_analysis.is_empty() {
                continue;
            }
            let label = document.label(d);
            let Some(source_text) = document.text.clone() else {
                tracing::warn!(document = %label, "skipping document: no source text to score analyses against");
                report.skipped_documents.push(label);
                continue;
            };
            let source_path = document.path.clone().unwrap_or_else(|| label.clone());

            for (a, analysis) in document.notice_analysis.iter().enumerate() {
                let subject = positions.len();
                positions.push((d, a));
                let owned = Arc::new(OwnedSubject {
                    analysis: analysis.clone(),
                    source_text: source_text.clone(),
                    source_path: source_path.clone(),
                });
                let model = analysis.llm_model_name.as_deref().unwrap_or("unknown");
                for experiment in &experiments {
                    invocations.push(Invocation {
                        subject,
                        label: format!("{}/{}#{}", label, model, a),
                        experiment: experiment.clone(),
                        target: Target::Analysis(owned.clone()),
                    });
                }
            }
        }
        report.subjects = positions.len();
        let owners: Vec<usize> = invocations.iter().map(|i| i.subject).collect();

        let sweep = self.sweep(invocations).await?;

        for (subject, slot) in owners.into_iter().zip(sweep.slots) {
            let Some(results) = slot else { continue };
            report.invocations += 1;
            tally(&mut report, &results);
            let (d, a) = positions[subject];
            manifest.documents[d].notice_analysis[a]
                .evaluation_results
                .extend(results);
        }
        report.cancelled = sweep.cancelled;
        log_summary(&report, "analysis");

        Ok(report)
    }

    /// Runs invocations with at most `settings.parallel` in flight. Permits are taken in
    /// planning order, so `parallel = 1` is a strictly sequential sweep.
    async fn sweep(&self, invocations: Vec<Invocation>) -> anyhow::Result<Sweep> {
        let total = invocations.len();
        let parallel = self.settings.parallel.max(1);
        let limit = match self.settings.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let sem = Arc::new(Semaphore::new(parallel));
        let mut join_set = JoinSet::new();
        let mut slots: Vec<Option<Vec<EvaluationResult>>> = (0..total).map(|_| None).collect();
        let mut done = 0;
        let mut cancelled = false;

        for (index, invocation) in invocations.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                permit = sem.clone().acquire_owned() => permit?,
            };
            while let Some(joined) = join_set.try_join_next() {
                self.collect(joined, &mut slots, &mut done, total);
            }
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            tracing::debug!(
                experiment = invocation.experiment.name(),
                subject = %invocation.label,
                "invoking experiment"
            );
            join_set.spawn(async move {
                let _permit = permit;
                let results = invoke(&invocation, limit).await;
                (index, invocation.label, invocation.experiment.name().to_string(), results)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            self.collect(joined, &mut slots, &mut done, total);
        }

        if cancelled {
            tracing::warn!(done, total, "run cancelled; returning partial results");
        }
        Ok(Sweep { slots, cancelled })
    }

    fn collect(
        &self,
        joined: Result<(usize, String, String, Vec<EvaluationResult>), tokio::task::JoinError>,
        slots: &mut [Option<Vec<EvaluationResult>>],
        done: &mut usize,
        total: usize,
    ) {
        match joined {
            Ok((index, label, experiment, results)) => {
                tracing::info!(
                    experiment = %experiment,
                    subject = %label,
                    results = results.len(),
                    "experiment finished"
                );
                slots[index] = Some(results);
            }
            Err(e) => {
                tracing::error!(error = %e, "experiment task did not complete");
            }
        }
        *done += 1;
        if let Some(ref sink) = self.progress {
            sink(ProgressEvent { done: *done, total });
        }
    }
}

fn applicable(registry: &ExperimentRegistry, kind: ExperimentKind) -> Vec<Experiment> {
    let (matching, other): (Vec<&Experiment>, Vec<&Experiment>) =
        registry.experiments().iter().partition(|e| e.kind() == kind);
    for e in other {
        tracing::debug!(experiment = e.name(), "experiment not applicable in this mode");
    }
    matching.into_iter().cloned().collect()
}

/// One experiment call. Errors, timeouts and panics all become a single unscored result.
async fn invoke(invocation: &Invocation, limit: Option<Duration>) -> Vec<EvaluationResult> {
    let name = invocation.experiment.name();
    let started = Instant::now();

    let call = async {
        match (&invocation.experiment, &invocation.target) {
            (Experiment::Scenario(e), Target::Scenario(s)) => e.run_eval(s).await,
            (Experiment::Analysis(e), Target::Analysis(a)) => e.run_eval(&a.as_subject()).await,
            _ => Err(anyhow::anyhow!("experiment '{}' does not accept this subject", name)),
        }
    };
    let guarded = AssertUnwindSafe(call).catch_unwind();

    let outcome = match limit {
        Some(limit) => match timeout(limit, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => Ok(Err(RunError::experiment_timeout(name, limit.as_secs()).into())),
        },
        None => guarded.await,
    };
    let elapsed = started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64;

    let outcome = outcome.unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".into());
        Err(anyhow::anyhow!("experiment panicked: {}", message))
    });

    match outcome {
        Ok(output) => {
            let mut results = output.into_results();
            for r in &mut results {
                r.duration_ms.get_or_insert(elapsed);
            }
            results
        }
        Err(e) => {
            let classified = RunError::from_anyhow(&e);
            let message = format!("{:#}", e);
            tracing::error!(
                experiment = name,
                subject = %invocation.label,
                error_kind = classified.kind.as_str(),
                error = %message,
                "experiment failed"
            );
            let mut failed =
                EvaluationResult::unscored(name, format!("experiment failed: {}", message)).with_details(
                    serde_json::json!({
                        "error_kind": classified.kind.as_str(),
                        "status": classified.status,
                        "provider": classified.provider,
                    }),
                );
            failed.duration_ms = Some(elapsed);
            vec![failed]
        }
    }
}

fn tally(report: &mut RunReport, results: &[EvaluationResult]) {
    report.results += results.len();
    report.failed += results.iter().filter(|r| r.is_failed()).count();
}

fn log_summary(report: &RunReport, mode: &str) {
    tracing::info!(
        mode,
        run_id = %report.run_id,
        experiments = report.experiments.len(),
        subjects = report.subjects,
        invocations = report.invocations,
        results = report.results,
        failed = report.failed,
        skipped_documents = report.skipped_documents.len(),
        cancelled = report.cancelled,
        "evaluation run complete"
    );
}

/// True when the manifest carries analyses to score rather than translations to compare.
pub fn has_analyses(manifest: &Manifest) -> bool {
    manifest
        .documents
        .iter()
        .any(|d| !d.notice_analysis.is_empty())
}

/// Languages present in the manifest that are neither the reference nor configured.
pub fn unconfigured_languages(manifest: &Manifest, settings: &Settings) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for t in manifest.documents.iter().flat_map(|d| d.translations.iter()) {
        let known = settings
            .supported_languages
            .iter()
            .any(|l| same_language(l, &t.language));
        if !known && !out.iter().any(|l| same_language(l, &t.language)) {
            out.push(t.language.clone());
        }
    }
    out
}
