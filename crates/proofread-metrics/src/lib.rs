use std::path::{Path, PathBuf};
use std::sync::Arc;

use proofread_core::metrics_api::{Experiment, ValueRange};
use proofread_core::providers::llm::LlmClient;
use proofread_core::registry::{PluginExperimentSpec, PluginFactory};
use serde::Deserialize;

pub mod command;
pub mod faithfulness;
pub mod hallucination;
pub mod judge;
pub mod relevancy;
pub mod rouge;
pub mod rubric;

use judge::Judge;

/// Built-in experiments. Judge-backed ones are included only when a judge client is given.
pub fn default_experiments(judge_client: Option<Arc<dyn LlmClient>>) -> Vec<Experiment> {
    let mut out = vec![Experiment::scenario(rouge::RougeExperiment::default())];
    let Some(client) = judge_client else {
        return out;
    };
    let judge = Judge::new(client);
    out.push(Experiment::analysis(faithfulness::FaithfulnessExperiment::new(
        faithfulness::NAME,
        judge.clone(),
    )));
    out.push(Experiment::analysis(relevancy::AnswerRelevancyExperiment::new(
        relevancy::NAME,
        judge.clone(),
    )));
    out.push(Experiment::analysis(hallucination::HallucinationExperiment::new(
        hallucination::NAME,
        judge.clone(),
    )));
    for (criterion, description) in rubric::CRITERIA {
        out.push(Experiment::analysis(rubric::AnalysisRubric::new(
            rubric::metric_name(criterion),
            *criterion,
            *description,
            judge.clone(),
        )));
    }
    out
}

/// Builds plugin-declared experiments of the built-in kinds.
pub struct BuiltinFactory {
    judge_client: Option<Arc<dyn LlmClient>>,
}

impl BuiltinFactory {
    pub fn new(judge_client: Option<Arc<dyn LlmClient>>) -> Self {
        Self { judge_client }
    }

    fn judge(&self, kind: &str) -> anyhow::Result<Judge> {
        self.judge_client
            .clone()
            .map(Judge::new)
            .ok_or_else(|| anyhow::anyhow!("kind '{}' needs an LLM judge but none is configured", kind))
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Variant {
    Scenario,
    #[default]
    Analysis,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoOptions {}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RubricOptions {
    criterion: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    variant: Variant,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandOptions {
    program: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default = "scenario_variant")]
    variant: Variant,
    #[serde(default)]
    value_range: Option<ValueRange>,
}

fn scenario_variant() -> Variant {
    Variant::Scenario
}

fn options<T: serde::de::DeserializeOwned>(spec: &PluginExperimentSpec) -> anyhow::Result<T> {
    serde_json::from_value(serde_json::Value::Object(spec.options.clone()))
        .map_err(|e| anyhow::anyhow!("invalid options for kind '{}': {}", spec.kind, e))
}

impl PluginFactory for BuiltinFactory {
    fn kinds(&self) -> Vec<&'static str> {
        vec![
            "rouge",
            "rubric",
            "faithfulness",
            "answer_relevancy",
            "hallucination",
            "command",
        ]
    }

    fn build(&self, spec: &PluginExperimentSpec, unit_dir: &Path) -> anyhow::Result<Experiment> {
        let name = spec.name.clone();
        match spec.kind.as_str() {
            "rouge" => {
                options::<NoOptions>(spec)?;
                Ok(Experiment::scenario(rouge::RougeExperiment::new(name)))
            }
            "faithfulness" => {
                options::<NoOptions>(spec)?;
                let judge = self.judge(&spec.kind)?;
                Ok(Experiment::analysis(faithfulness::FaithfulnessExperiment::new(name, judge)))
            }
            "answer_relevancy" => {
                options::<NoOptions>(spec)?;
                let judge = self.judge(&spec.kind)?;
                Ok(Experiment::analysis(relevancy::AnswerRelevancyExperiment::new(name, judge)))
            }
            "hallucination" => {
                options::<NoOptions>(spec)?;
                let judge = self.judge(&spec.kind)?;
                Ok(Experiment::analysis(hallucination::HallucinationExperiment::new(name, judge)))
            }
            "rubric" => {
                let opts: RubricOptions = options(spec)?;
                let description = opts
                    .description
                    .or_else(|| rubric::describe(&opts.criterion).map(str::to_string))
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "criterion '{}' is not built in; give it a description",
                            opts.criterion
                        )
                    })?;
                let judge = self.judge(&spec.kind)?;
                Ok(match opts.variant {
                    Variant::Analysis => Experiment::analysis(rubric::AnalysisRubric::new(
                        name,
                        opts.criterion,
                        description,
                        judge,
                    )),
                    Variant::Scenario => Experiment::scenario(rubric::TranslationRubric::new(
                        name,
                        opts.criterion,
                        description,
                        judge,
                    )),
                })
            }
            "command" => {
                let opts: CommandOptions = options(spec)?;
                let experiment = command::CommandExperiment {
                    name,
                    program: resolve_program(&opts.program, unit_dir),
                    args: opts.args,
                    working_dir: Some(unit_dir.to_path_buf()),
                    value_range: opts.value_range,
                };
                Ok(match opts.variant {
                    Variant::Scenario => Experiment::scenario(command::CommandScenario(experiment)),
                    Variant::Analysis => Experiment::analysis(command::CommandAnalysis(experiment)),
                })
            }
            other => anyhow::bail!("unknown experiment kind '{}'", other),
        }
    }
}

/// Paths with a separator are relative to the plugin unit; bare names are looked up on PATH.
fn resolve_program(program: &str, unit_dir: &Path) -> PathBuf {
    let p = Path::new(program);
    if p.is_absolute() || p.components().count() == 1 {
        p.to_path_buf()
    } else {
        unit_dir.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofread_core::metrics_api::ExperimentKind;
    use proofread_core::providers::llm::fake::FakeClient;

    fn spec(kind: &str, name: &str, options: serde_json::Value) -> PluginExperimentSpec {
        PluginExperimentSpec {
            kind: kind.into(),
            name: name.into(),
            options: options.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn defaults_without_judge_are_rouge_only() {
        let names: Vec<String> = default_experiments(None)
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["rouge_experiment"]);
    }

    #[test]
    fn defaults_with_judge_include_rubric_criteria() {
        let client: Arc<dyn LlmClient> = Arc::new(FakeClient::new("judge"));
        let experiments = default_experiments(Some(client));
        let names: Vec<&str> = experiments.iter().map(|e| e.name()).collect();
        assert!(names.contains(&"faithfulness"));
        assert!(names.contains(&"g_eval:summarization_correctness"));
        let hallucination = experiments.iter().find(|e| e.name() == "hallucination").unwrap();
        assert_eq!(hallucination.value_range(), Some(ValueRange::INVERTED_UNIT));
    }

    #[test]
    fn factory_builds_variants_and_validates_options() {
        let client: Arc<dyn LlmClient> = Arc::new(FakeClient::new("judge"));
        let factory = BuiltinFactory::new(Some(client));
        let dir = Path::new("/plugins");

        let e = factory
            .build(&spec("rubric", "fluency", serde_json::json!({"criterion": "fluency", "description": "Reads naturally.", "variant": "scenario"})), dir)
            .unwrap();
        assert_eq!(e.kind(), ExperimentKind::Scenario);

        let e = factory
            .build(&spec("rubric", "g_eval:bias", serde_json::json!({"criterion": "bias"})), dir)
            .unwrap();
        assert_eq!(e.kind(), ExperimentKind::Analysis);

        assert!(factory
            .build(&spec("rubric", "x", serde_json::json!({"criterion": "novel"})), dir)
            .is_err());
        assert!(factory
            .build(&spec("rouge", "r", serde_json::json!({"stemmer": true})), dir)
            .is_err());
    }

    #[test]
    fn judge_kinds_need_a_client() {
        let factory = BuiltinFactory::new(None);
        let err = factory
            .build(&spec("faithfulness", "f", serde_json::json!({})), Path::new("."))
            .err()
            .unwrap();
        assert!(err.to_string().contains("needs an LLM judge"));
    }

    #[test]
    fn command_program_paths_resolve_against_unit() {
        assert_eq!(resolve_program("python3", Path::new("/p")), PathBuf::from("python3"));
        assert_eq!(resolve_program("bin/score.sh", Path::new("/p")), PathBuf::from("/p/bin/score.sh"));
        assert_eq!(resolve_program("/usr/bin/env", Path::new("/p")), PathBuf::from("/usr/bin/env"));
    }
}
