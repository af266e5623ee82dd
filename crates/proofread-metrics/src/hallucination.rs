use crate::judge::Judge;
use async_trait::async_trait;
use proofread_core::metrics_api::{AnalysisExperiment, AnalysisSubject, ExperimentOutput, ValueRange};

pub const NAME: &str = "hallucination";

/// Share of each analysis part that contradicts or is absent from the source. 0 is good.
pub struct HallucinationExperiment {
    name: String,
    judge: Judge,
}

impl HallucinationExperiment {
    pub fn new(name: impl Into<String>, judge: Judge) -> Self {
        Self {
            name: name.into(),
            judge,
        }
    }
}

fn prompt(source: &str, output: &str) -> String {
    format!(
        "### Task\nDecide how much of the output is hallucinated: information that contradicts \
         the source or cannot be found in it. Score 0 when everything is grounded in the source \
         and 1 when nothing is.\n\n\
         ### Source document:\n<source>\n{}\n</source>\n\n\
         ### Output:\n<output>\n{}\n</output>\n",
        source, output
    )
}

#[async_trait]
impl AnalysisExperiment for HallucinationExperiment {
    fn name(&self) -> &str {
        &self.name
    }

    fn value_range(&self) -> Option<ValueRange> {
        Some(ValueRange::INVERTED_UNIT)
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
