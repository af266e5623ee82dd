use crate::model::{Analysis, EvaluationResult, Scenario};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which end of an experiment's score range is good. Scores are not normalized by the
/// core; downstream aggregation uses this to orient them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub positive: f64,
    pub negative: f64,
}

impl ValueRange {
    pub const UNIT: ValueRange = ValueRange {
        positive: 1.0,
        negative: 0.0,
    };
    pub const INVERTED_UNIT: ValueRange = ValueRange {
        positive: 0.0,
        negative: 1.0,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExperimentOutput {
    One(EvaluationResult),
    Many(Vec<EvaluationResult>),
}

impl ExperimentOutput {
    pub fn into_results(self) -> Vec<EvaluationResult> {
        match self {
            ExperimentOutput::One(r) => vec![r],
            ExperimentOutput::Many(rs) => rs,
        }
    }
}

impl From<EvaluationResult> for ExperimentOutput {
    fn from(r: EvaluationResult) -> Self {
        ExperimentOutput::One(r)
    }
}

impl From<Vec<EvaluationResult>> for ExperimentOutput {
    fn from(rs: Vec<EvaluationResult>) -> Self {
        ExperimentOutput::Many(rs)
    }
}

/// What an analysis-level experiment scores: one analysis plus the source it was produced from.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AnalysisSubject<'a> {
    pub analysis: &'a Analysis,
    pub source_text: &'a str,
    pub source_path: &'a str,
}

/// Scores one (baseline, evaluation) scenario.
#[async_trait]
pub trait ScenarioExperiment: Send + Sync {
    fn name(&self) -> &str;

    fn value_range(&self) -> Option<ValueRange> {
        None
    }

    async fn run_eval(&self, scenario: &Scenario) -> anyhow::Result<ExperimentOutput>;
}

/// Scores one analysis against its source document.
#[async_trait]
pub trait AnalysisExperiment: Send + Sync {
    fn name(&self) -> &str;

    fn value_range(&self) -> Option<ValueRange> {
        None
    }

    async fn run_eval(&self, subject: &AnalysisSubject<'_>) -> anyhow::Result<ExperimentOutput>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentKind {
    Scenario,
    Analysis,
}

#[derive(Clone)]
pub enum Experiment {
    Scenario(Arc<dyn ScenarioExperiment>),
    Analysis(Arc<dyn AnalysisExperiment>),
}

impl Experiment {
    pub fn scenario(e: impl ScenarioExperiment + 'static) -> Self {
        Experiment::Scenario(Arc::new(e))
    }

    pub fn analysis(e: impl AnalysisExperiment + 'static) -> Self {
        Experiment::Analysis(Arc::new(e))
    }

    pub fn name(&self) -> &str {
        match self {
            Experiment::Scenario(e) => e.name(),
            Experiment::Analysis(e) => e.name(),
        }
    }

    pub fn kind(&self) -> ExperimentKind {
        match self {
            Experiment::Scenario(_) => ExperimentKind::Scenario,
            Experiment::Analysis(_) => ExperimentKind::Analysis,
        }
    }

    pub fn value_range(&self) -> Option<ValueRange> {
        match self {
            Experiment::Scenario(e) => e.value_range(),
            Experiment::Analysis(e) => e.value_range(),
        }
    }
}

impl std::fmt::Debug for Experiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Experiment")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}
