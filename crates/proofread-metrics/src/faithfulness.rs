use crate::judge::Judge;
use async_trait::async_trait;
use proofread_core::metrics_api::{AnalysisExperiment, AnalysisSubject, ExperimentOutput, ValueRange};

pub const NAME: &str = "faithfulness";

/// How much of each analysis part (summary, then every answer) is supported by the source.
pub struct FaithfulnessExperiment {
    name: String,
    judge: Judge,
}

impl FaithfulnessExperiment {
    pub fn new(name: impl Into<String>, judge: Judge) -> Self {
        Self {
            name: name.into(),
            judge,
        }
    }
}

fn prompt(source: &str, claim: &str) -> String {
    format!(
        "### Task\nBreak the candidate text into individual claims and decide, for each one, \
         whether the source document supports it. Score = supported claims / all claims.\n\n\
         ### Source document:\n<source>\n{}\n</source>\n\n\
         ### Candidate text:\n<candidate>\n{}\n</candidate>\n",
        source, claim
    )
}

#[async_trait]
impl AnalysisExperiment for FaithfulnessExperiment {
    fn name(&self) -> &str {
        &self.name
    }

    fn value_range(&self) -> Option<ValueRange> {
        Some(ValueRange::UNIT)
    }

    async fn run_eval(&self, subject: &AnalysisSubject<'_>) -> anyhow::Result<ExperimentOutput> {
        let mut results = Vec::new();
        for (part, text) in subject.analysis.parts() {
            let p = prompt(subject.source_text, text);
            results.push(self.judge.score_part(&self.name, part, &p).await);
        }
        Ok(results.into())
    }
}
