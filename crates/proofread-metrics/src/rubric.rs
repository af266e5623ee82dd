//! G-Eval style rubric criteria judged by an LLM.

use crate::judge::Judge;
use async_trait::async_trait;
use proofread_core::metrics_api::{
    AnalysisExperiment, AnalysisSubject, ExperimentOutput, ScenarioExperiment, ValueRange,
};
use proofread_core::model::{EvaluationResult, Scenario};

pub const BASE_NAME: &str = "g_eval";

/// Built-in analysis criteria and what the judge is told about each.
pub const CRITERIA: &[(&str, &str)] = &[
    (
        "clarity",
        "The analysis is easy to follow: plain wording, no unexplained jargon, each answer gets to the point.",
    ),
    (
        "bias",
        "The analysis is neutral. It does not add opinions, stereotypes or judgements about the recipient that the source does not support. A fully neutral analysis scores 1.",
    ),
    (
        "completeness",
        "The summary and answers cover every deadline, required action and consequence stated in the source.",
    ),
    (
        "summarization_correctness",
        "The summary states the purpose and key facts of the source correctly and omits nothing essential.",
    ),
];

pub fn describe(criterion: &str) -> Option<&'static str> {
    CRITERIA
        .iter()
        .find(|(name, _)| *name == criterion)
        .map(|(_, description)| *description)
}

/// Metric name for a built-in criterion, e.g. `g_eval:clarity`.
pub fn metric_name(criterion: &str) -> String {
    format!("{}:{}", BASE_NAME, criterion)
}

/// Scores a whole analysis against its source for one criterion.
pub struct AnalysisRubric {
    name: String,
    criterion: String,
    description: String,
    judge: Judge,
}

impl AnalysisRubric {
    pub fn new(
        name: impl Into<String>,
        criterion: impl Into<String>,
        description: impl Into<String>,
        judge: Judge,
    ) -> Self {
        Self {
            name: name.into(),
            criterion: criterion.into(),
            description: description.into(),
            judge,
        }
    }
}

#[async_trait]
impl AnalysisExperiment for AnalysisRubric {
    fn name(&self) -> &str {
        &self.name
    }

    fn value_range(&self) -> Option<ValueRange> {
        Some(ValueRange::UNIT)
    }

    async fn run_eval(&self, subject: &AnalysisSubject<'_>) -> anyhow::Result<ExperimentOutput> {
        let mut rendered = format!("Summary: {}\n", subject.analysis.summary);
        for q in &subject.analysis.questions {
            rendered.push_str(&format!("\nQ: {}\nA: {}\n", q.question, q.answer));
        }
        let prompt = format!(
            "### Criterion: {}\n{}\n\n\
             ### Source document:\n<source>\n{}\n</source>\n\n\
             ### Analysis:\n<analysis>\n{}\n</analysis>\n\n\
             Score how well the analysis meets the criterion.",
            self.criterion, self.description, subject.source_text, rendered
        );
        let verdict = self.judge.score(&prompt).await?;
        Ok(EvaluationResult::new(self.name.clone(), verdict.score)
            .with_reason(verdict.reason)
            .with_model(self.judge.model())
            .with_details(serde_json::json!({ "criterion": self.criterion }))
            .into())
    }
}

/// Scores a candidate translation against the reference for one criterion.
pub struct TranslationRubric {
    name: String,
    criterion: String,
    description: String,
    judge: Judge,
}

impl TranslationRubric {
    pub fn new(
        name: impl Into<String>,
        criterion: impl Into<String>,
        description: impl Into<String>,
        judge: Judge,
    ) -> Self {
        Self {
            name: name.into(),
            criterion: criterion.into(),
            description: description.into(),
            judge,
        }
    }
}

#[async_trait]
impl ScenarioExperiment for TranslationRubric {
    fn name(&self) -> &str {
        &self.name
    }

    fn value_range(&self) -> Option<ValueRange> {
        Some(ValueRange::UNIT)
    }

    async fn run_eval(&self, scenario: &Scenario) -> anyhow::Result<ExperimentOutput> {
        let prompt = format!(
            "### Criterion: {}\n{}\n\n\
             ### Reference translation ({}):\n<reference>\n{}\n</reference>\n\n\
             ### Candidate translation:\n<candidate>\n{}\n</candidate>\n\n\
             Score how well the candidate meets the criterion, using the reference as ground truth.",
            self.criterion,
            self.description,
            scenario.baseline.language,
            scenario.baseline.text,
            scenario.evaluation.text
        );
        let verdict = self.judge.score(&prompt).await?;
        Ok(EvaluationResult::new(self.name.clone(), verdict.score)
            .with_reason(verdict.reason)
            .with_model(self.judge.model())
            .with_details(serde_json::json!({
                "criterion": self.criterion,
                "scenario": scenario.name,
            }))
            .into())
    }
}
