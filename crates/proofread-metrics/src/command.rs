//! Experiments implemented by an external program.
//!
//! The subject (a scenario, or an analysis with its source) is written to the program's stdin
//! as JSON. Stdout must hold one result object or an array of them. A result without
//! `metric_name` is named after the experiment. A non-zero exit status fails the invocation.

use async_trait::async_trait;
use proofread_core::metrics_api::{
    AnalysisExperiment, AnalysisSubject, ExperimentOutput, ScenarioExperiment, ValueRange,
};
use proofread_core::model::{EvaluationResult, Scenario};
use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct CommandExperiment {
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub value_range: Option<ValueRange>,
}

impl CommandExperiment {
    async fn run<T: Serialize + ?Sized>(&self, subject: &T) -> anyhow::Result<ExperimentOutput> {
        let input = serde_json::to_vec(subject)?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            anyhow::anyhow!("failed to start {}: {}", self.program.display(), e)
        })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await?;
            stdin.shutdown().await?;
        }
        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            );
        }
        self.parse_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn parse_output(&self, stdout: &str) -> anyhow::Result<ExperimentOutput> {
        let value: serde_json::Value = serde_json::from_str(stdout.trim())
            .map_err(|e| anyhow::anyhow!("plugin output is not JSON: {}", e))?;
        match value {
            serde_json::Value::Array(items) => Ok(items
                .into_iter()
                .map(|item| self.to_result(item))
                .collect::<anyhow::Result<Vec<_>>>()?
                .into()),
            item @ serde_json::Value::Object(_) => Ok(self.to_result(item)?.into()),
            _ => anyhow::bail!("plugin output must be a result object or an array of results"),
        }
    }

    fn to_result(&self, mut item: serde_json::Value) -> anyhow::Result<EvaluationResult> {
        if let Some(map) = item.as_object_mut() {
            map.entry("metric_name")
                .or_insert_with(|| serde_json::Value::String(self.name.clone()));
        }
        serde_json::from_value(item).map_err(|e| anyhow::anyhow!("invalid plugin result: {}", e))
    }
}

/// Scenario-level wrapper around [`CommandExperiment`].
pub struct CommandScenario(pub CommandExperiment);

#[async_trait]
impl ScenarioExperiment for CommandScenario {
    fn name(&self) -> &str {
        &self.0.name
    }

    fn value_range(&self) -> Option<ValueRange> {
        self.0.value_range
    }

    async fn run_eval(&self, scenario: &Scenario) -> anyhow::Result<ExperimentOutput> {
        self.0.run(scenario).await
    }
}

/// Analysis-level wrapper around [`CommandExperiment`].
pub struct CommandAnalysis(pub CommandExperiment);

#[async_trait]
impl AnalysisExperiment for CommandAnalysis {
    fn name(&self) -> &str {
        &self.0.name
    }

    fn value_range(&self) -> Option<ValueRange> {
        self.0.value_range
    }

    async fn run_eval(&self, subject: &AnalysisSubject<'_>) -> anyhow::Result<ExperimentOutput> {
        self.0.run(subject).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn experiment() -> CommandExperiment {
        CommandExperiment {
            name: "external".into(),
            program: PathBuf::from("unused"),
            args: vec![],
            working_dir: None,
            value_range: None,
        }
    }

    #[test]
    fn object_and_array_outputs_are_accepted() {
        let e = experiment();
        let one = e.parse_output(r#"{"score": 0.5}"#).unwrap().into_results();
        assert_eq!(one[0].metric_name, "external");
        assert_eq!(one[0].score, Some(0.5));

        let many = e
            .parse_output(r#"[{"metric_name": "external:a", "score": 1}, {"score": null, "reason": "n/a"}]"#)
            .unwrap()
            .into_results();
        assert_eq!(many.len(), 2);
        assert_eq!(many[0].metric_name, "external:a");
        assert!(many[1].is_failed());
    }

    #[test]
    fn non_result_output_is_rejected() {
        let e = experiment();
        assert!(e.parse_output("42").is_err());
        assert!(e.parse_output("not json").is_err());
        assert!(e.parse_output(r#"{"score": "high"}"#).is_err());
    }
}
