//! Flattens scored analyses from one or more manifests into rows for aggregation.

use crate::generate::prompts::{HEADED_QUESTIONS, PLAIN_QUESTIONS};
use crate::metrics_api::ValueRange;
use crate::model::Manifest;
use crate::registry::ExperimentRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Canonical labels for the analysis questions, aligned with the prompt question lists.
pub const QUESTION_LABELS: &[&str] = &[
    "Required Actions",
    "Document Classification",
    "Plain Language",
    "Effectiveness",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// File name of the source document.
    pub document: String,
    pub analysis_llm: Option<String>,
    pub analysis_prompt: Option<String>,
    pub metric_name: String,
    pub score: Option<f64>,
    pub reason: Option<String>,
    pub evaluation_llm: Option<String>,
    /// Canonical lower-cased question label, or `summary`.
    pub related_analysis: Option<String>,
    pub positive: Option<f64>,
    pub negative: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricMean {
    pub metric_name: String,
    pub mean: Option<f64>,
    pub scored: usize,
    pub failed: usize,
}

/// Maps the various phrasings of one question (plain question, bold heading, heading with
/// its instructions) to one label. Unknown text is returned trimmed.
pub fn canonical_question(raw: &str) -> String {
    let text = raw.trim();
    if let Some(i) = PLAIN_QUESTIONS.iter().position(|q| *q == text) {
        return QUESTION_LABELS[i].to_string();
    }
    let heading = text
        .trim_start_matches("**")
        .split(|c| c == ':' || c == '*')
        .next()
        .unwrap_or("")
        .trim();
    if let Some(i) = HEADED_QUESTIONS
        .iter()
        .position(|h| h.trim_matches('*') == heading)
    {
        return QUESTION_LABELS[i].to_string();
    }
    text.to_string()
}

/// Value ranges of every registered experiment, by experiment name.
pub fn value_ranges(registry: &ExperimentRegistry) -> BTreeMap<String, ValueRange> {
    registry
        .experiments()
        .iter()
        .filter_map(|e| e.value_range().map(|r| (e.name().to_string(), r)))
        .collect()
}

/// Exact metric name first, then the experiment name before a `:` sub-metric suffix.
fn lookup_range<'a>(ranges: &'a BTreeMap<String, ValueRange>, metric: &str) -> Option<&'a ValueRange> {
    ranges
        .get(metric)
        .or_else(|| metric.split_once(':').and_then(|(base, _)| ranges.get(base)))
}

pub fn flatten_results(manifests: &[Manifest], registry: &ExperimentRegistry) -> Vec<SummaryRow> {
    let ranges = value_ranges(registry);
    let mut rows = Vec::new();
    for manifest in manifests {
        for (index, document) in manifest.documents.iter().enumerate() {
            let name = document
                .path
                .as_deref()
                .and_then(|p| Path::new(p).file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| document.label(index));
            for analysis in &document.notice_analysis {
                for result in &analysis.evaluation_results {
                    let range = lookup_range(&ranges, &result.metric_name);
                    if range.is_none() {
                        tracing::debug!(metric = %result.metric_name, "no value range registered for metric");
                    }
                    rows.push(SummaryRow {
                        document: name.clone(),
                        analysis_llm: analysis.llm_model_name.clone(),
                        analysis_prompt: analysis.prompt_name.clone(),
                        metric_name: result.metric_name.clone(),
                        score: result.score,
                        reason: result.reason.clone(),
                        evaluation_llm: result.llm_model_name.clone(),
                        related_analysis: result
                            .related_analysis
                            .as_deref()
                            .map(|q| canonical_question(q).to_lowercase()),
                        positive: range.map(|r| r.positive),
                        negative: range.map(|r| r.negative),
                    });
                }
            }
        }
    }
    rows
}

/// Mean score per metric, in order of first appearance. Unscored rows count as failed.
pub fn metric_means(rows: &[SummaryRow]) -> Vec<MetricMean> {
    let mut order: Vec<String> = Vec::new();
    let mut acc: BTreeMap<String, (f64, usize, usize)> = BTreeMap::new();
    for row in rows {
        let entry = acc.entry(row.metric_name.clone()).or_insert_with(|| {
            order.push(row.metric_name.clone());
            (0.0, 0, 0)
        });
        match row.score {
            Some(s) => {
                entry.0 += s;
                entry.1 += 1;
            }
            None => entry.2 += 1,
        }
    }
    order
        .into_iter()
        .filter_map(|name| {
            acc.get(&name).map(|(sum, scored, failed)| MetricMean {
                mean: (*scored > 0).then(|| sum / *scored as f64),
                metric_name: name,
                scored: *scored,
                failed: *failed,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics_api::{AnalysisExperiment, AnalysisSubject, Experiment, ExperimentOutput};
    use crate::model::{Analysis, Document, EvaluationResult};
    use async_trait::async_trait;

    struct Ranged(&'static str, ValueRange);

    #[async_trait]
    impl AnalysisExperiment for Ranged {
        fn name(&self) -> &str {
            self.0
        }

        fn value_range(&self) -> Option<ValueRange> {
            Some(self.1)
        }

        async fn run_eval(&self, _subject: &AnalysisSubject<'_>) -> anyhow::Result<ExperimentOutput> {
            Ok(ExperimentOutput::Many(vec![]))
        }
    }

    #[test]
    fn question_variants_share_a_label() {
        assert_eq!(canonical_question("What actions are required by the recipient?"), "Required Actions");
        assert_eq!(canonical_question("**Required Actions**"), "Required Actions");
        assert_eq!(
            canonical_question("**Plain Language Assessment**: Evaluate whether this notice uses plain language."),
            "Plain Language"
        );
        assert_eq!(canonical_question("Effectiveness Improvements"), "Effectiveness");
        assert_eq!(canonical_question(" summary "), "summary");
    }

    #[test]
    fn rows_carry_analysis_and_range_fields() {
        let mut registry = ExperimentRegistry::new();
        registry.register(Experiment::analysis(Ranged("hallucination", ValueRange::INVERTED_UNIT)));
        registry.register(Experiment::analysis(Ranged("g_eval", ValueRange::UNIT)));

        let analysis = Analysis {
            summary: "s".into(),
            questions: vec![],
            llm_model_name: Some("aya-expanse:8b".into()),
            prompt_name: Some("prompt_2".into()),
            evaluation_results: vec![
                EvaluationResult::new("hallucination", 0.25)
                    .with_model("deepseek-r1:8b")
                    .with_related_analysis("**Document Classification**"),
                EvaluationResult::new("g_eval:clarity", 0.5),
                EvaluationResult::unscored("g_eval:clarity", "judge unavailable"),
                EvaluationResult::new("custom", 3.0),
            ],
        };
        let manifest = Manifest {
            documents: vec![Document {
                path: Some("docs/ca/approval.pdf".into()),
                notice_analysis: vec![analysis],
                ..Document::default()
            }],
        };

        let rows = flatten_results(&[manifest], &registry);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].document, "approval.pdf");
        assert_eq!(rows[0].analysis_prompt.as_deref(), Some("prompt_2"));
        assert_eq!(rows[0].evaluation_llm.as_deref(), Some("deepseek-r1:8b"));
        assert_eq!(rows[0].related_analysis.as_deref(), Some("document classification"));
        assert_eq!((rows[0].positive, rows[0].negative), (Some(0.0), Some(1.0)));
        assert_eq!(rows[1].positive, Some(1.0));
        assert_eq!(rows[3].positive, None);

        let means = metric_means(&rows);
        assert_eq!(means[0].metric_name, "hallucination");
        assert_eq!(means[1].metric_name, "g_eval:clarity");
        assert_eq!(means[1].mean, Some(0.5));
        assert_eq!(means[1].failed, 1);
    }
}
