use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "proofread",
    version,
    about = "Multi-model LLM evaluation for public-benefit notices: translate, analyze, score"
)]
pub struct Cli {
    /// Settings file (falls back to PROOFREAD_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Translate reference-language baselines with each model
    Translate(GenerateArgs),
    /// Summarize and question each document with each model
    Analyze(GenerateArgs),
    /// Score translations (scenario matrix) or analyses with the selected experiments
    Evaluate(EvaluateArgs),
    /// List registered experiments and plugin load errors
    Experiments(ExperimentsArgs),
    /// Flatten evaluated manifests into JSON Lines rows
    Summarize(SummarizeArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalMode {
    Translation,
    Analysis,
}

#[derive(Args, Clone, Debug)]
pub struct GenerateArgs {
    pub manifest: PathBuf,

    /// Output path (default: stdout)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Model to run; repeatable. Defaults to the configured candidate models
    #[arg(long = "model")]
    pub models: Vec<String>,

    /// Rejected: experiments only run under `evaluate`
    #[arg(long, hide = true)]
    pub experiments: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct EvaluateArgs {
    pub manifest: PathBuf,

    /// Output path (default: stdout)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Comma-separated allow-list; empty runs every applicable experiment
    #[arg(long, default_value = "")]
    pub experiments: String,

    /// Defaults to `analysis` when the manifest carries analyses, else `translation`
    #[arg(long, value_enum)]
    pub mode: Option<EvalMode>,

    /// Plugin directory (overrides `plugin_dir` from settings)
    #[arg(long, env = "PROOFREAD_PLUGIN_DIR")]
    pub plugin_dir: Option<PathBuf>,

    /// Concurrent experiment invocations (overrides settings)
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Per-invocation time limit in seconds; 0 disables it (overrides settings)
    #[arg(long)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Args, Clone, Debug)]
pub struct ExperimentsArgs {
    #[arg(long, env = "PROOFREAD_PLUGIN_DIR")]
    pub plugin_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Clone, Debug)]
pub struct SummarizeArgs {
    /// Evaluated manifests, or directories whose `*.json` files are read
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// JSON Lines output path
    #[arg(long, short)]
    pub output: PathBuf,

    /// Plugin directory, for value ranges of plugin experiments
    #[arg(long, env = "PROOFREAD_PLUGIN_DIR")]
    pub plugin_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_flags_parse() {
        let cli = Cli::try_parse_from([
            "proofread",
            "--log-format",
            "json",
            "evaluate",
            "manifest.json",
            "--experiments",
            "rouge_experiment,faithfulness",
            "--mode",
            "analysis",
            "--parallel",
            "4",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        let Command::Evaluate(args) = cli.cmd else {
            panic!("expected evaluate");
        };
        assert_eq!(args.experiments, "rouge_experiment,faithfulness");
        assert_eq!(args.mode, Some(EvalMode::Analysis));
        assert_eq!(args.parallel, Some(4));
        assert_eq!(args.timeout_seconds, None);
    }

    #[test]
    fn translate_collects_repeated_models() {
        let cli = Cli::try_parse_from([
            "proofread",
            "translate",
            "m.json",
            "--model",
            "aya-expanse:8b",
            "--model",
            "mistral-nemo:latest",
            "--config",
            "proofread.yaml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("proofread.yaml")));
        let Command::Translate(args) = cli.cmd else {
            panic!("expected translate");
        };
        assert_eq!(args.models, vec!["aya-expanse:8b", "mistral-nemo:latest"]);
    }

    #[test]
    fn summarize_requires_inputs() {
        assert!(Cli::try_parse_from(["proofread", "summarize", "--output", "rows.jsonl"]).is_err());
    }
}
