use crate::judge::Judge;
use async_trait::async_trait;
use proofread_core::metrics_api::{AnalysisExperiment, AnalysisSubject, ExperimentOutput, ValueRange};

pub const NAME: &str = "answer_relevancy";

/// Whether each answer addresses its question. The summary has no question and is not scored.
pub struct AnswerRelevancyExperiment {
    name: String,
    judge: Judge,
}

impl AnswerRelevancyExperiment {
    pub fn new(name: impl Into<String>, judge: Judge) -> Self {
        Self {
            name: name.into(),
            judge,
        }
    }
}

fn prompt(question: &str, answer: &str) -> String {
    format!(
        "### Task\nSplit the answer into statements and decide, for each one, whether it is \
         relevant to the question. Score = relevant statements / all statements.\n\n\
         ### Question:\n<question>\n{}\n</question>\n\n\
         ### Answer:\n<answer>\n{}\n</answer>\n",
        question, answer
    )
}

#[async_trait]
impl AnalysisExperiment for AnswerRelevancyExperiment {
    fn name(&self) -> &str {
        &self.name
    }

    fn value_range(&self) -> Option<ValueRange> {
        Some(ValueRange::UNIT)
    }

    async fn run_eval(&self, subject: &AnalysisSubject<'_>) -> anyhow::Result<ExperimentOutput> {
        let mut results = Vec::with_capacity(subject.analysis.questions.len());
        for q in &subject.analysis.questions {
            let p = prompt(&q.question, &q.answer);
            results.push(self.judge.score_part(&self.name, &q.question, &p).await);
        }
        Ok(results.into())
    }
}
